// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;
use tw_core::{Bound, Index, Path, Query, QueryParams};

use super::{check_status, connect, parse_value};
use crate::cli::QueryArgs;
use crate::config::Settings;
use crate::error::{Error, Result};

/// Tag attached to a filtered listen so its updates can be told apart.
const QUERY_TAG: u64 = 1;

pub(crate) async fn run(settings: Settings, path: &str, args: &QueryArgs) -> Result<()> {
    let query = build_query(path, args);
    let tag = (!query.params.is_default()).then_some(QUERY_TAG);
    let conn = connect(settings, true)?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    conn.listen(
        query,
        Arc::new(String::new),
        tag,
        Arc::new(move |status, data| {
            let _ = tx.send((status, data));
        }),
    )?;

    let stopped = conn.wait();
    tokio::pin!(stopped);
    let result = loop {
        tokio::select! {
            Some((status, data)) = rx.recv() => {
                if let Err(e) = check_status(status, data) {
                    break Err(e);
                }
                info!(path, "listening");
            }
            result = &mut stopped => break result.map_err(Error::from),
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
                break Ok(());
            }
        }
    };
    conn.shutdown();
    result
}

/// Builds the query described by the listen flags.
pub(crate) fn build_query(path: &str, args: &QueryArgs) -> Query {
    let mut params = QueryParams::default();
    if args.order_by_key {
        params = params.order_by(Index::Key);
    } else if args.order_by_value {
        params = params.order_by(Index::Value);
    } else if let Some(child) = &args.order_by_child {
        params = params.order_by(Index::Child(Path::new(child)));
    }
    if let Some(start) = &args.start_at {
        params = params.start_at(Bound::new(parse_value(start)));
    }
    if let Some(end) = &args.end_at {
        params = params.end_at(Bound::new(parse_value(end)));
    }
    if let Some(limit) = args.limit_to_first {
        params = params.limit_to_first(limit);
    } else if let Some(limit) = args.limit_to_last {
        params = params.limit_to_last(limit);
    }
    Query::new(path, params)
}

#[cfg(test)]
#[path = "listen_tests.rs"]
mod tests;

//! Cluster member resolution and leader location.
//!
//! Both run over short-lived connections separate from the pool: one
//! connection, one query line, one response line. Member resolution asks
//! any reachable seed for the membership list; leader location probes
//! every member concurrently with an `isleader` query.

use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tracing::{debug, trace};

use crate::error::{ClientError, Result};
use crate::protocol;

/// One cluster node as reported by the membership query.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Member {
    pub(crate) id: String,
    pub(crate) addr: String,
}

/// Open a short-lived connection to `addr`, send a single query and
/// return the response payload. Connection is dropped on return.
pub(crate) async fn query_once(addr: &str, command: &str, timeout: Duration) -> Result<String> {
    let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| ClientError::Timeout)?
        .map_err(ClientError::ConnectionFailed)?;

    let (read_half, mut write_half) = stream.into_split();
    let request = protocol::encode_request(protocol::PROBE_REQUEST_ID, command);
    write_half.write_all(request.as_bytes()).await?;

    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    let n = tokio::time::timeout(timeout, reader.read_line(&mut line))
        .await
        .map_err(|_| ClientError::Timeout)??;
    if n == 0 {
        return Err(ClientError::ConnectionClosed);
    }

    let (_, payload) = protocol::parse_response(&line)?;
    Ok(payload)
}

/// Resolve the full member address set from a comma-separated seed list.
///
/// Seeds are tried in order; the first one answering with a non-empty
/// list wins. Each member's client address is its reported host combined
/// with the answering seed's port — the port inside `addr` is a
/// cluster-internal port and is discarded.
pub(crate) async fn resolve_members(seeds: &str, timeout: Duration) -> Result<Vec<String>> {
    for seed in seeds.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match members_from_seed(seed, timeout).await {
            Ok(members) if !members.is_empty() => {
                debug!(seed, count = members.len(), "resolved cluster members");
                return Ok(members);
            }
            Ok(_) => debug!(seed, "seed returned an empty member list"),
            Err(e) => debug!(seed, error = %e, "seed did not answer membership query"),
        }
    }
    Err(ClientError::NoMembersFound)
}

async fn members_from_seed(seed: &str, timeout: Duration) -> Result<Vec<String>> {
    let (_, seed_port) = seed
        .rsplit_once(':')
        .ok_or_else(|| ClientError::Protocol(format!("seed address missing port: {:?}", seed)))?;

    let payload = query_once(seed, "members", timeout).await?;
    let members: Vec<Member> = serde_json::from_str(payload.trim())?;

    let mut resolved = Vec::with_capacity(members.len());
    for member in &members {
        let host = member.addr.split(':').next().unwrap_or(&member.addr);
        trace!(id = %member.id, host, "member reported");
        resolved.push(format!("{}:{}", host, seed_port));
    }
    Ok(resolved)
}

/// Probe every member concurrently and return the current leader.
///
/// A member that cannot be reached, does not answer, or answers with an
/// unparsable boolean simply counts as "not leader". If more than one
/// member claims leadership the last answer observed wins; under a
/// correct server this cannot happen, but the client does not assume it.
pub(crate) async fn find_leader(members: &[String], timeout: Duration) -> Result<String> {
    let mut probes = JoinSet::new();
    for member in members {
        let member = member.clone();
        probes.spawn(async move {
            if probe_is_leader(&member, timeout).await {
                Some(member)
            } else {
                None
            }
        });
    }

    let mut leader = None;
    while let Some(result) = probes.join_next().await {
        if let Ok(Some(addr)) = result {
            // Last true answer wins.
            leader = Some(addr);
        }
    }

    match leader {
        Some(addr) => {
            debug!(leader = %addr, "leader located");
            Ok(addr)
        }
        None => Err(ClientError::NoLeaderFound),
    }
}

async fn probe_is_leader(addr: &str, timeout: Duration) -> bool {
    match query_once(addr, "isleader", timeout).await {
        Ok(payload) => {
            let claimed = payload.trim().parse::<bool>().unwrap_or(false);
            trace!(addr, claimed, "leader probe answered");
            claimed
        }
        Err(e) => {
            debug!(addr, error = %e, "leader probe failed");
            false
        }
    }
}

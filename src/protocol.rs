//! Line-oriented wire format.
//!
//! Every message is one UTF-8 line, newline-terminated:
//! `<request-id>::<text>`. Requests carry the command text, responses
//! carry either a payload or an `ERROR:<message>` marker.

use crate::error::{ClientError, Result};

/// Separator between the request id and the rest of the line.
pub const ID_DELIMITER: &str = "::";

/// Prefix marking a server-side failure in a response payload.
pub const ERROR_PREFIX: &str = "ERROR:";

/// Request id used on short-lived discovery connections. Those
/// connections carry exactly one query, so the id never collides.
pub const PROBE_REQUEST_ID: u64 = 1;

/// Encode a request line, newline included.
pub fn encode_request(id: u64, command: &str) -> String {
    format!("{}{}{}\n", id, ID_DELIMITER, command)
}

/// Parse one response line into `(request_id, payload)`.
///
/// The line is split on the first `::` so payloads containing the
/// delimiter survive intact. Trailing CR/LF is stripped.
pub fn parse_response(line: &str) -> Result<(u64, String)> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (id_part, payload) = line.split_once(ID_DELIMITER).ok_or_else(|| {
        ClientError::Protocol(format!("response line missing id delimiter: {:?}", line))
    })?;
    let id = id_part
        .trim()
        .parse::<u64>()
        .map_err(|_| ClientError::Protocol(format!("invalid request id: {:?}", id_part)))?;
    Ok((id, payload.to_string()))
}

/// Turn a response payload into a result, surfacing `ERROR:` payloads
/// as [`ClientError::Remote`] with the remainder passed through verbatim.
pub fn into_result(payload: String) -> Result<String> {
    match payload.strip_prefix(ERROR_PREFIX) {
        Some(message) => Err(ClientError::Remote(message.to_string())),
        None => Ok(payload),
    }
}

use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Two-phase guard for destructive operations.
///
/// Phase 1: calling a destructive tool returns a [`PendingAction`] describing
/// the would-be mutation and carrying an opaque resume token. Nothing is
/// executed and nothing is stored server-side; the pending state rides the
/// round trip through the caller.
///
/// Phase 2: the caller resubmits through the distinct `confirm_action`
/// operation with the identical arguments plus the token. The token is a
/// keyed fingerprint of (tool name, canonical argument JSON), so a resubmit
/// with altered arguments fails closed instead of executing a stale action.
///
/// The key is random per process: tokens do not survive a server restart and
/// cannot be minted by the model, only echoed back from a phase-1 response.
pub struct ConfirmationGate {
    key: [u8; 32],
}

/// Phase-1 artifact returned in place of a destructive tool's result.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingAction {
    pub status: PendingStatus,
    pub tool: String,
    pub arguments: Value,
    pub prompt: String,
    pub resume_token: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingStatus {
    ConfirmationRequired,
}

impl ConfirmationGate {
    pub fn new() -> Self {
        let mut key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        Self { key }
    }

    /// Deterministic gate for tests.
    pub fn with_key(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Build the phase-1 response for a destructive call.
    pub fn pending(&self, tool: &str, arguments: &Value) -> PendingAction {
        PendingAction {
            status: PendingStatus::ConfirmationRequired,
            tool: tool.to_string(),
            arguments: arguments.clone(),
            prompt: format!(
                "`{tool}` is a destructive operation and cannot be undone. \
                 Ask the user to review the arguments above, then call \
                 `confirm_action` with the same tool name, the same arguments, \
                 and this resume_token to proceed."
            ),
            resume_token: self.fingerprint(tool, arguments),
        }
    }

    /// Phase-2 check: true only for an unmodified (tool, arguments) pair.
    pub fn verify(&self, tool: &str, arguments: &Value, resume_token: &str) -> bool {
        let expected = self.fingerprint(tool, arguments);
        // Both values are hex of equal length; a simple comparison suffices
        // since the token is not a bearer secret beyond this process.
        expected == resume_token
    }

    fn fingerprint(&self, tool: &str, arguments: &Value) -> String {
        let mut payload = Vec::with_capacity(64);
        payload.extend_from_slice(tool.as_bytes());
        payload.push(0);
        canonical_bytes(arguments, &mut payload);
        blake3::keyed_hash(&self.key, &payload).to_hex().to_string()
    }
}

impl Default for ConfirmationGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize a JSON value with object keys sorted, so that argument maps
/// fingerprint identically regardless of field order on the wire.
fn canonical_bytes(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Object(map) => {
            out.push(b'{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (index, key) in keys.iter().enumerate() {
                if index > 0 {
                    out.push(b',');
                }
                out.extend_from_slice(format!("{:?}:", key).as_bytes());
                canonical_bytes(&map[*key], out);
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(b',');
                }
                canonical_bytes(item, out);
            }
            out.push(b']');
        }
        other => {
            out.extend_from_slice(other.to_string().as_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ConfirmationGate, PendingStatus};

    fn gate() -> ConfirmationGate {
        ConfirmationGate::with_key([7u8; 32])
    }

    #[test]
    fn pending_action_round_trips_through_verify() {
        let gate = gate();
        let args = json!({"group_id": "216196257331370181"});
        let pending = gate.pending("zpa_delete_segment_group", &args);
        assert_eq!(pending.status, PendingStatus::ConfirmationRequired);
        assert!(gate.verify("zpa_delete_segment_group", &args, &pending.resume_token));
    }

    #[test]
    fn altered_arguments_fail_closed() {
        let gate = gate();
        let args = json!({"group_id": "1"});
        let pending = gate.pending("zpa_delete_segment_group", &args);
        let altered = json!({"group_id": "2"});
        assert!(!gate.verify("zpa_delete_segment_group", &altered, &pending.resume_token));
    }

    #[test]
    fn token_is_bound_to_the_tool_name() {
        let gate = gate();
        let args = json!({"id": "1"});
        let pending = gate.pending("zia_delete_ip_destination_group", &args);
        assert!(!gate.verify("zpa_delete_segment_group", &args, &pending.resume_token));
    }

    #[test]
    fn key_order_does_not_change_the_fingerprint() {
        let gate = gate();
        let a = serde_json::from_str::<serde_json::Value>(r#"{"a":1,"b":[true,null]}"#).unwrap();
        let b = serde_json::from_str::<serde_json::Value>(r#"{"b":[true,null],"a":1}"#).unwrap();
        let pending = gate.pending("t", &a);
        assert!(gate.verify("t", &b, &pending.resume_token));
    }

    #[test]
    fn different_process_keys_reject_each_other() {
        let args = json!({"id": "1"});
        let pending = ConfirmationGate::with_key([1u8; 32]).pending("t", &args);
        assert!(!ConfirmationGate::with_key([2u8; 32]).verify("t", &args, &pending.resume_token));
    }
}

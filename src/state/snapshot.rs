//! # Persisted form of [`AsyncState`].
//!
//! Persistence only ever sees "have data or don't":
//! - a state with data that is either successful or in stale mode serializes as
//!   `{"status": "success", "mode": .., "data": ..}`, whatever its real status;
//! - a stale-mode state without data serializes as `{"mode": "stale"}`, so the mode
//!   survives a round-trip;
//! - everything else (fresh-mode idle/pending/error) serializes as `null`.
//!
//! Hydration is the inverse: `null` becomes a fresh idle state, a snapshot with data
//! becomes a success state in the recorded mode, a bare `{"mode": ..}` an idle state in
//! that mode. Request identities are never written.

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

use crate::state::async_state::{fresh, AsyncState, Mode, Status};

#[derive(serde::Serialize)]
struct SnapshotRef<'a, T> {
    status: Status,
    mode: Mode,
    data: &'a T,
}

#[derive(serde::Serialize)]
struct ModeOnly {
    mode: Mode,
}

#[derive(serde::Deserialize)]
struct SnapshotOwned<T> {
    #[allow(dead_code)]
    #[serde(default)]
    status: Option<Status>,
    mode: Mode,
    #[serde(default = "Option::default")]
    data: Option<T>,
}

impl<T: Serialize> Serialize for AsyncState<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let visible = self.is_success() || self.mode() == Mode::Stale;
        match self.data() {
            Some(data) if visible => serializer.serialize_some(&SnapshotRef {
                status: Status::Success,
                mode: self.mode(),
                data,
            }),
            _ if self.mode() == Mode::Stale => {
                serializer.serialize_some(&ModeOnly { mode: Mode::Stale })
            }
            _ => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for AsyncState<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let snapshot = Option::<SnapshotOwned<T>>::deserialize(deserializer)?;
        Ok(match snapshot {
            Some(SnapshotOwned {
                mode,
                data: Some(data),
                ..
            }) => AsyncState::success(mode, data),
            Some(SnapshotOwned { mode, .. }) => AsyncState::idle(mode, None),
            None => fresh(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ActionError;
    use crate::state::async_state::stale;
    use serde_json::json;

    #[test]
    fn test_fresh_non_success_serializes_to_null() {
        let pending: AsyncState<u32> = AsyncState::pending(Mode::Fresh, None);
        let failed: AsyncState<u32> = AsyncState::error(Mode::Fresh, ActionError::fail("x"), None);
        assert_eq!(serde_json::to_value(&pending).unwrap(), json!(null));
        assert_eq!(serde_json::to_value(&failed).unwrap(), json!(null));
        assert_eq!(serde_json::to_value(fresh::<u32>()).unwrap(), json!(null));
    }

    #[test]
    fn test_stale_states_serialize_as_success() {
        let failed = AsyncState::error(Mode::Stale, ActionError::fail("x"), Some(5));
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({"status": "success", "mode": "stale", "data": 5})
        );
        assert_eq!(
            serde_json::to_value(stale("seed")).unwrap(),
            json!({"status": "success", "mode": "stale", "data": "seed"})
        );
    }

    #[test]
    fn test_hydrate_yields_success_or_fresh_idle() {
        let s: AsyncState<u32> =
            serde_json::from_value(json!({"status": "success", "mode": "fresh", "data": 3})).unwrap();
        assert!(s.is_success());
        assert_eq!(s.data(), Some(&3));
        assert!(s.request_id().is_none());

        let empty: AsyncState<u32> = serde_json::from_value(json!(null)).unwrap();
        assert_eq!(empty.status(), Status::Idle);
        assert_eq!(empty.mode(), Mode::Fresh);
    }

    #[test]
    fn test_stale_mode_without_data_survives_round_trip() {
        let loading: AsyncState<u32> = AsyncState::pending(Mode::Stale, None);
        let value = serde_json::to_value(&loading).unwrap();
        assert_eq!(value, json!({"mode": "stale"}));

        let back: AsyncState<u32> = serde_json::from_value(value).unwrap();
        assert_eq!(back.mode(), Mode::Stale);
        assert_eq!(back.status(), Status::Idle);
        assert_eq!(back.data(), None);
    }
}

//! Opaque id source.

use std::sync::atomic::{AtomicU64, Ordering};

use orderflow_core::OpaqueId;
use uuid::Uuid;

static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Create a new opaque id.
///
/// Format: `{seq:06x}-{uuid_short}`. The sequence part is strictly
/// increasing within the process, so two calls never collide; the uuid
/// fragment keeps ids from separate runs apart.
pub fn generate_id() -> OpaqueId {
    let seq = NEXT_SEQ.fetch_add(1, Ordering::Relaxed);
    let uuid = Uuid::new_v4().simple().to_string();
    OpaqueId::from(format!("{seq:06x}-{}", &uuid[..8]))
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use serde_json::Value;

/// Older files kept the search key under `tavily`; fold it into `search`.
pub(super) fn migrate_on_load(value: Value) -> Value {
    let Value::Object(mut map) = value else {
        return value;
    };

    if let Some(legacy) = map.remove("tavily") {
        let current = map
            .remove("search")
            .unwrap_or_else(|| Value::Object(Default::default()));
        // Explicit `search` values win over the legacy block.
        map.insert("search".to_string(), deep_merge(legacy, current));
    }

    Value::Object(map)
}

/// Deep-merge two JSON values.
/// `base` is existing file content, `overlay` is serialized current struct.
/// Overlay values take priority.
pub(super) fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = if let Some(base_val) = base_map.remove(&key) {
                    deep_merge(base_val, overlay_val)
                } else {
                    overlay_val
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_base, overlay) => overlay,
    }
}

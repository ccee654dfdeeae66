// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use crate::error::{RelayError, Result};

use super::Settings;

impl Settings {
    /// Reject values that would stall or disable a session.
    pub fn validate(&self) -> Result<()> {
        if self.session.flush_interval_ms == 0 {
            return Err(RelayError::Config(
                "session.flush_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.session.cancel_attempts == 0 {
            return Err(RelayError::Config(
                "session.cancel_attempts must be at least 1".to_string(),
            ));
        }
        if self.search.max_results == 0 {
            return Err(RelayError::Config(
                "search.max_results must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Check whether the live backend can be reached with these settings.
    pub fn is_openai_configured(&self) -> bool {
        self.get_openai_api_key().is_some() && self.openai.assistant_id.is_some()
    }
}

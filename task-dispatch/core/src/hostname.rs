// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

/// Name of the host this participant runs on, used to attribute results
pub fn local_hostname() -> String {
    match whoami::fallible::hostname() {
        Ok(name) if !name.is_empty() => name,
        Ok(_) => "localhost".to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "Could not determine hostname");
            "localhost".to_string()
        }
    }
}

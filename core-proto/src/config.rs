//! Ambient bits of configuration that both binaries share. Actual
//! configuration-file parsing is an external collaborator (spec §1); what
//! lives here is the small, spec-mandated surface: the debug-verbosity
//! environment override and the `RELOAD`-visible shape of "configuration"
//! as a `Default`-constructible value the engine can re-read.

use std::env;

/// Environment variable that overrides the `--debug` default if set
/// (spec §6: "a debug-verbosity integer variable overrides the --debug
/// default if set").
pub const DEBUG_ENV_VAR: &str = "SPEAKER_DEBUG_LEVEL";

/// Environment variable that may redirect raw-sample output, used by
/// subprocess-backend playback modes (spec §6). Carried here as a named
/// constant even though this core does not implement a subprocess-pipe
/// backend itself (§4.4 lists it as a backend variant; only the native
/// and RTP backends are built out, see DESIGN.md).
pub const RAW_OUTPUT_FD_ENV_VAR: &str = "SPEAKER_RAW_FD";

/// Resolve the effective debug verbosity: the environment variable wins
/// over the CLI default when set and parses as a non-negative integer.
pub fn effective_debug_level(cli_debug: bool) -> u8 {
    match env::var(DEBUG_ENV_VAR).ok().and_then(|v| v.parse::<u8>().ok()) {
        Some(level) => level,
        None => {
            if cli_debug {
                1
            } else {
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_cli_flag_when_env_unset() {
        env::remove_var(DEBUG_ENV_VAR);
        assert_eq!(effective_debug_level(false), 0);
        assert_eq!(effective_debug_level(true), 1);
    }
}

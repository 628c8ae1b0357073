//! Tracing configuration and initialization.

use tracing_subscriber::{
    EnvFilter,
    fmt::format::FmtSpan,
    util::{SubscriberInitExt as _, TryInitError},
};

pub struct Trc {
    env_filter: EnvFilter,
    verbose_spans: bool,
}

impl Default for Trc {
    fn default() -> Self {
        let maybe_env_filter = EnvFilter::try_from_env("VFS_DIRCACHE_LOG")
            .or_else(|_| EnvFilter::try_from_default_env());

        match maybe_env_filter {
            // An explicit filter means someone is debugging; show span timings too.
            Ok(env_filter) => Self {
                env_filter,
                verbose_spans: true,
            },
            Err(_) => Self {
                env_filter: EnvFilter::new("info"),
                verbose_spans: false,
            },
        }
    }
}

impl Trc {
    pub fn init(self) -> Result<(), TryInitError> {
        let span_events = if self.verbose_spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        tracing_subscriber::fmt()
            .with_env_filter(self.env_filter)
            .with_span_events(span_events)
            .with_writer(std::io::stderr)
            .with_target(false)
            .finish()
            .try_init()
    }
}

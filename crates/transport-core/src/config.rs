//! Configuration records for each ring-owning component.
//!
//! Plain `Copy`/`Clone` records with `Default` impls; loading these from a
//! file or environment is out of scope here — the host runtime constructs
//! them and passes them in.

/// Per-worker configuration.
#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    pub buffers_count: usize,
    pub sequences_count: usize,
    pub buffer_size: usize,
    pub ring_size: u32,
    pub ring_flags: u32,
    pub timeout_checker_period_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            buffers_count: 256,
            sequences_count: 256,
            buffer_size: 4096,
            ring_size: 256,
            ring_flags: 0,
            timeout_checker_period_ms: 100,
        }
    }
}

/// Builder for [`WorkerConfig`], mirroring the instance builders elsewhere
/// in this codebase.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerConfigBuilder {
    cfg: WorkerConfigOverrides,
}

#[derive(Debug, Clone, Copy, Default)]
struct WorkerConfigOverrides {
    buffers_count: Option<usize>,
    sequences_count: Option<usize>,
    buffer_size: Option<usize>,
    ring_size: Option<u32>,
    ring_flags: Option<u32>,
    timeout_checker_period_ms: Option<u64>,
}

impl WorkerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffers_count(mut self, n: usize) -> Self {
        self.cfg.buffers_count = Some(n);
        self
    }

    pub fn sequences_count(mut self, n: usize) -> Self {
        self.cfg.sequences_count = Some(n);
        self
    }

    pub fn buffer_size(mut self, n: usize) -> Self {
        self.cfg.buffer_size = Some(n);
        self
    }

    pub fn ring_size(mut self, n: u32) -> Self {
        self.cfg.ring_size = Some(n);
        self
    }

    pub fn ring_flags(mut self, n: u32) -> Self {
        self.cfg.ring_flags = Some(n);
        self
    }

    pub fn timeout_checker_period_ms(mut self, n: u64) -> Self {
        self.cfg.timeout_checker_period_ms = Some(n);
        self
    }

    pub fn build(self) -> WorkerConfig {
        let default = WorkerConfig::default();
        WorkerConfig {
            buffers_count: self.cfg.buffers_count.unwrap_or(default.buffers_count),
            sequences_count: self.cfg.sequences_count.unwrap_or(default.sequences_count),
            buffer_size: self.cfg.buffer_size.unwrap_or(default.buffer_size),
            ring_size: self.cfg.ring_size.unwrap_or(default.ring_size),
            ring_flags: self.cfg.ring_flags.unwrap_or(default.ring_flags),
            timeout_checker_period_ms: self
                .cfg
                .timeout_checker_period_ms
                .unwrap_or(default.timeout_checker_period_ms),
        }
    }
}

/// Acceptor configuration.
#[derive(Debug, Clone)]
pub struct AcceptorConfig {
    pub ring_size: u32,
    pub backlog: i32,
    pub ip: String,
    pub port: u16,
}

impl Default for AcceptorConfig {
    fn default() -> Self {
        Self {
            ring_size: 64,
            backlog: 1024,
            ip: "0.0.0.0".to_string(),
            port: 0,
        }
    }
}

/// Connector configuration.
#[derive(Debug, Clone, Copy)]
pub struct ConnectorConfig {
    pub ring_size: u32,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self { ring_size: 64 }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Copy)]
pub struct ListenerConfig {
    pub ring_size: u32,
    pub workers_count: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            ring_size: 64,
            workers_count: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_only_named_fields() {
        let cfg = WorkerConfigBuilder::new().buffers_count(16).buffer_size(4096).build();
        assert_eq!(cfg.buffers_count, 16);
        assert_eq!(cfg.buffer_size, 4096);
        assert_eq!(cfg.sequences_count, WorkerConfig::default().sequences_count);
    }
}

use std::time::Duration;

use crate::Error;

/// Piggyback configuration
#[derive(Debug, Clone)]
pub struct Config {
    dtls_in_stun: bool,
    retransmit_min_interval: Duration,
    retransmit_max_interval: Duration,
    flight_start_rto: Duration,
    piggyback_flight_rto: Duration,
    rng_seed: Option<u64>,
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            dtls_in_stun: false,
            retransmit_min_interval: Duration::from_millis(50),
            retransmit_max_interval: Duration::from_secs(1),
            flight_start_rto: Duration::from_secs(1),
            piggyback_flight_rto: Duration::from_secs(60 * 60),
            rng_seed: None,
        }
    }

    /// Whether both sides negotiated handshake piggybacking.
    ///
    /// This is the initial capability flag. A handshake restart forces it
    /// off for the remainder of the transport's life.
    #[inline(always)]
    pub fn dtls_in_stun(&self) -> bool {
        self.dtls_in_stun
    }

    /// Shortest interval between standalone retransmits of a pending flight.
    #[inline(always)]
    pub fn retransmit_min_interval(&self) -> Duration {
        self.retransmit_min_interval
    }

    /// Longest interval between standalone retransmits of a pending flight.
    ///
    /// Also the interval used before any round-trip estimate exists.
    #[inline(always)]
    pub fn retransmit_max_interval(&self) -> Duration {
        self.retransmit_max_interval
    }

    /// Handshake engine retransmit timeout without piggybacking.
    #[inline(always)]
    pub fn flight_start_rto(&self) -> Duration {
        self.flight_start_rto
    }

    /// Handshake engine retransmit timeout while piggybacking.
    ///
    /// Retransmits are paced by the connectivity checks instead, so the
    /// engine's own timer is pushed far out.
    #[inline(always)]
    pub fn piggyback_flight_rto(&self) -> Duration {
        self.piggyback_flight_rto
    }

    /// Seed for retransmit jitter.
    #[inline(always)]
    pub fn rng_seed(&self) -> Option<u64> {
        self.rng_seed
    }
}

/// Builder for piggyback configuration.
#[derive(Debug)]
pub struct ConfigBuilder {
    dtls_in_stun: bool,
    retransmit_min_interval: Duration,
    retransmit_max_interval: Duration,
    flight_start_rto: Duration,
    piggyback_flight_rto: Duration,
    rng_seed: Option<u64>,
}

impl ConfigBuilder {
    /// Set whether piggybacking was negotiated with the peer.
    ///
    /// Defaults to false.
    pub fn dtls_in_stun(mut self, enabled: bool) -> Self {
        self.dtls_in_stun = enabled;
        self
    }

    /// Set the lower clamp of the retransmit interval.
    ///
    /// Defaults to 50ms.
    pub fn retransmit_min_interval(mut self, interval: Duration) -> Self {
        self.retransmit_min_interval = interval;
        self
    }

    /// Set the upper clamp of the retransmit interval.
    ///
    /// Defaults to 1 second.
    pub fn retransmit_max_interval(mut self, interval: Duration) -> Self {
        self.retransmit_max_interval = interval;
        self
    }

    /// Set the handshake engine retransmit timeout used without piggybacking.
    ///
    /// Defaults to 1 second.
    pub fn flight_start_rto(mut self, rto: Duration) -> Self {
        self.flight_start_rto = rto;
        self
    }

    /// Set the handshake engine retransmit timeout used while piggybacking.
    ///
    /// Defaults to 1 hour.
    pub fn piggyback_flight_rto(mut self, rto: Duration) -> Self {
        self.piggyback_flight_rto = rto;
        self
    }

    /// Seed the retransmit jitter for deterministic behavior.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Build the configuration.
    ///
    /// Returns `Error::ConfigError` if the retransmit interval bounds are
    /// empty or inverted.
    pub fn build(self) -> Result<Config, Error> {
        if self.retransmit_min_interval.is_zero() {
            return Err(Error::ConfigError(
                "retransmit_min_interval must be non-zero".into(),
            ));
        }

        if self.retransmit_min_interval > self.retransmit_max_interval {
            return Err(Error::ConfigError(format!(
                "retransmit_min_interval {:?} exceeds retransmit_max_interval {:?}",
                self.retransmit_min_interval, self.retransmit_max_interval
            )));
        }

        Ok(Config {
            dtls_in_stun: self.dtls_in_stun,
            retransmit_min_interval: self.retransmit_min_interval,
            retransmit_max_interval: self.retransmit_max_interval,
            flight_start_rto: self.flight_start_rto,
            piggyback_flight_rto: self.piggyback_flight_rto,
            rng_seed: self.rng_seed,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::builder()
            .build()
            .expect("Default config should always validate")
    }
}

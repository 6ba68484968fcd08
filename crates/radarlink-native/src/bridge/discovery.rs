//! Board discovery and baud-rate negotiation.
//!
//! Every attempt opens a fresh transport, sends the GetBoardInfo probe and
//! waits for a CRC-valid reply naming a known board. A missing or corrupt
//! reply means the link parameters are wrong, so the candidate is retried once
//! at the fallback baud rate. An intact reply from an unknown board ends the
//! candidate: the link works, the board is just not ours.
//!
//! No transport outlives a failed attempt.

use std::thread;

use radarlink_core::protocol::{BoardInfo, Command, MAX_FRAME_PAYLOAD};

use super::exchange::PacketReader;
use super::session::{close_session, BoardSession};
use super::{Connector, Transport};
use crate::config::{BoardDescriptor, DiscoveryConfig};
use crate::error::{AttemptError, AttemptFailure, NotFoundError};

/// Finds boards through a [`Connector`].
#[derive(Debug)]
pub struct Discovery<C: Connector> {
    connector: C,
    config: DiscoveryConfig,
}

impl<C: Connector> Discovery<C> {
    /// Create a discovery with default configuration.
    #[must_use]
    pub fn new(connector: C) -> Self {
        Self::with_config(connector, DiscoveryConfig::default())
    }

    /// Create a discovery with custom configuration.
    #[must_use]
    pub fn with_config(connector: C, config: DiscoveryConfig) -> Self {
        Self { connector, config }
    }

    /// Current configuration.
    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// The connector used to open transports.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Probe candidates in order and return the first board found.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] listing every failed attempt if no candidate
    /// yields a known board at either baud rate.
    pub fn discover<S: AsRef<str>>(&self, candidates: &[S]) -> Result<BoardSession<C::Transport>, NotFoundError> {
        let mut failures = NotFoundError::default();

        for candidate in candidates {
            match self.probe(candidate.as_ref()) {
                Ok(session) => return Ok(session),
                Err(err) => failures.attempts.extend(err.attempts),
            }
        }

        tracing::debug!("No board found on {} candidates", candidates.len());
        Err(failures)
    }

    /// Probe a single candidate at the primary, then the fallback baud rate.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] with one entry per rejected attempt.
    pub fn probe(&self, identifier: &str) -> Result<BoardSession<C::Transport>, NotFoundError> {
        let mut failures = NotFoundError::default();

        for baud_rate in self.config.baud_rates() {
            match self.attempt(identifier, baud_rate) {
                Ok(session) => return Ok(session),
                Err(cause) => {
                    tracing::debug!("No board on {} at {} baud: {}", identifier, baud_rate, cause);
                    let retry = cause.is_retryable();
                    failures.attempts.push(AttemptFailure { identifier: identifier.to_string(), baud_rate, cause });
                    if !retry {
                        break;
                    }
                }
            }
        }

        Err(failures)
    }

    /// A single handshake at one baud rate.
    ///
    /// # Errors
    ///
    /// Returns why the attempt was rejected. The transport is closed on every
    /// error path.
    pub fn attempt(&self, identifier: &str, baud_rate: u32) -> Result<BoardSession<C::Transport>, AttemptError> {
        tracing::debug!("Probing {} at {} baud", identifier, baud_rate);

        let mut transport = self.connector.open(identifier, baud_rate)?;
        let mut reader = PacketReader::new(MAX_FRAME_PAYLOAD);

        match self.handshake(&mut transport, &mut reader) {
            Ok((info, descriptor)) => {
                tracing::info!(
                    "Found {} (fw {}.{}.{}) on {} at {} baud",
                    descriptor.name,
                    info.firmware.0,
                    info.firmware.1,
                    info.firmware.2,
                    identifier,
                    baud_rate
                );
                Ok(BoardSession::new(transport, baud_rate, info, descriptor, reader, self.config.probe_timeout))
            }
            Err(err) => {
                transport.close();
                Err(err)
            }
        }
    }

    fn handshake(
        &self,
        transport: &mut C::Transport,
        reader: &mut PacketReader,
    ) -> Result<(BoardInfo, BoardDescriptor), AttemptError> {
        let payload = reader.transact(transport, Command::GetBoardInfo, &[], self.config.probe_timeout)?;
        let info = BoardInfo::from_bytes(&payload)?;

        let descriptor = self
            .config
            .find_board(&info)
            .ok_or(AttemptError::UnknownBoard { vid: info.vid, pid: info.pid })?;

        Ok((info, descriptor.clone()))
    }
}

impl<C> Discovery<C>
where
    C: Connector + Sync,
    C::Transport: Send,
{
    /// Probe all candidates concurrently, one thread per candidate.
    ///
    /// Returns the successful session that comes first in candidate order;
    /// any other sessions found are closed.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] listing every failed attempt, in candidate
    /// order, if no candidate yields a board.
    pub fn discover_parallel<S: AsRef<str> + Sync>(
        &self,
        candidates: &[S],
    ) -> Result<BoardSession<C::Transport>, NotFoundError> {
        let results: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = candidates
                .iter()
                .map(|candidate| scope.spawn(move || self.probe(candidate.as_ref())))
                .collect();

            handles
                .into_iter()
                .zip(candidates)
                .map(|(handle, candidate)| {
                    handle.join().unwrap_or_else(|_| {
                        tracing::error!("Probe thread for {} panicked", candidate.as_ref());
                        Err(NotFoundError::default())
                    })
                })
                .collect()
        });

        let mut found = None;
        let mut failures = NotFoundError::default();
        for result in results {
            match result {
                Ok(session) if found.is_none() => found = Some(session),
                Ok(extra) => close_session(Some(extra)),
                Err(err) => failures.attempts.extend(err.attempts),
            }
        }

        found.ok_or(failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::sim::{SimulatedBoard, SimulatedConnector};
    use crate::config::{FALLBACK_BAUD_RATE, PRIMARY_BAUD_RATE};
    use crate::error::TransportError;
    use std::time::Duration;

    fn fast_config() -> DiscoveryConfig {
        DiscoveryConfig { probe_timeout: Duration::from_millis(20), ..DiscoveryConfig::default() }
    }

    #[test]
    fn test_primary_rate_succeeds_first() {
        let connector = SimulatedConnector::new("sim0", SimulatedBoard::default());
        let discovery = Discovery::with_config(connector, fast_config());

        let session = discovery.discover(&["sim0"]).unwrap();
        assert_eq!(session.baud_rate(), PRIMARY_BAUD_RATE);
        assert_eq!(session.descriptor().name, "Radar Baseboard MCU7");
        assert_eq!(discovery.connector().open_calls().len(), 1);
    }

    #[test]
    fn test_unknown_board_is_not_retried() {
        let mut board = SimulatedBoard::default();
        board.info.pid = 0x7777;
        let connector = SimulatedConnector::new("sim0", board);
        let discovery = Discovery::with_config(connector, fast_config());

        let err = discovery.discover(&["sim0"]).unwrap_err();
        assert_eq!(err.attempts.len(), 1);
        assert!(matches!(err.attempts[0].cause, AttemptError::UnknownBoard { pid: 0x7777, .. }));
        assert_eq!(discovery.connector().open_transports(), 0);
    }

    #[test]
    fn test_corrupt_replies_exhaust_both_rates() {
        let connector = SimulatedConnector::new("sim0", SimulatedBoard::default().with_corrupt_replies());
        let discovery = Discovery::with_config(connector, fast_config());

        let err = discovery.probe("sim0").unwrap_err();
        let rates: Vec<u32> = err.attempts.iter().map(|a| a.baud_rate).collect();
        assert_eq!(rates, vec![PRIMARY_BAUD_RATE, FALLBACK_BAUD_RATE]);
        assert!(err.attempts.iter().all(|a| matches!(a.cause, AttemptError::Integrity(_))));
        assert_eq!(discovery.connector().open_transports(), 0);
    }

    #[test]
    fn test_missing_port_is_transport_failure() {
        let connector = SimulatedConnector::new("sim0", SimulatedBoard::default());
        let discovery = Discovery::with_config(connector, fast_config());

        let err = discovery.probe("nope").unwrap_err();
        assert_eq!(err.attempts.len(), 2);
        assert!(matches!(err.attempts[0].cause, AttemptError::Transport(TransportError::Open { .. })));
    }

    #[test]
    fn test_first_candidate_wins() {
        let connector = SimulatedConnector::new("sim0", SimulatedBoard::default())
            .with_port("sim1", SimulatedBoard::default());
        let discovery = Discovery::with_config(connector, fast_config());

        let session = discovery.discover(&["sim1", "sim0"]).unwrap();
        assert_eq!(session.identifier(), "sim1");
        assert_eq!(discovery.connector().open_calls(), vec![("sim1".to_string(), PRIMARY_BAUD_RATE)]);
    }
}

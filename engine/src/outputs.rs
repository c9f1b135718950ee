//! # Cycle Outputs
//!
//! What a cycle leaves behind:
//!
//! - **Notices**: informational payloads, committed with the cycle.
//! - **Vouchers**: executable calls, committed with the cycle.
//! - **Reports**: diagnostics. Returned whether the cycle commits or not.
//!
//! Notices and vouchers share one emission-ordered sequence so the runtime
//! sees them in the order the application produced them. Callers that only
//! care about one kind index into the filtered views positionally.

use serde::{Deserialize, Serialize};

use crate::primitives::hex_bytes;
use crate::voucher::Voucher;

/// Informational output attached to a committed cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    #[serde(with = "hex_bytes")]
    pub payload: Vec<u8>,
}

/// Diagnostic output. Survives rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    #[serde(with = "hex_bytes")]
    pub payload: Vec<u8>,
}

/// A committed output, in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Output {
    Notice(Notice),
    Voucher(Voucher),
}

impl Output {
    /// The notice, if this is one.
    pub fn as_notice(&self) -> Option<&Notice> {
        match self {
            Output::Notice(n) => Some(n),
            Output::Voucher(_) => None,
        }
    }

    /// The voucher, if this is one.
    pub fn as_voucher(&self) -> Option<&Voucher> {
        match self {
            Output::Voucher(v) => Some(v),
            Output::Notice(_) => None,
        }
    }
}

/// Append-only log for one cycle.
#[derive(Debug, Clone, Default)]
pub struct OutputLog {
    outputs: Vec<Output>,
    reports: Vec<Report>,
}

impl OutputLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a notice and returns its position in the output sequence.
    pub fn notice(&mut self, payload: Vec<u8>) -> usize {
        self.outputs.push(Output::Notice(Notice { payload }));
        self.outputs.len() - 1
    }

    /// Appends a voucher and returns its position in the output sequence.
    pub fn voucher(&mut self, voucher: Voucher) -> usize {
        self.outputs.push(Output::Voucher(voucher));
        self.outputs.len() - 1
    }

    /// Appends a report.
    pub fn report(&mut self, payload: Vec<u8>) {
        self.reports.push(Report { payload });
    }

    /// Outputs so far, in emission order.
    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    /// Reports so far.
    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    /// Drops every notice and voucher. Reports stay.
    pub fn discard_outputs(&mut self) {
        self.outputs.clear();
    }

    /// Splits the log into outputs and reports.
    pub fn into_parts(self) -> (Vec<Output>, Vec<Report>) {
        (self.outputs, self.reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{Address, U256};

    #[test]
    fn outputs_keep_emission_order() {
        let mut log = OutputLog::new();
        assert_eq!(log.notice(b"first".to_vec()), 0);
        assert_eq!(
            log.voucher(Voucher::new(Address::ZERO, U256::zero(), vec![])),
            1
        );
        assert_eq!(log.notice(b"second".to_vec()), 2);

        let notices: Vec<_> = log.outputs().iter().filter_map(Output::as_notice).collect();
        assert_eq!(notices[0].payload, b"first");
        assert_eq!(notices[1].payload, b"second");
        assert_eq!(log.outputs().iter().filter_map(Output::as_voucher).count(), 1);
    }

    #[test]
    fn discard_keeps_reports() {
        let mut log = OutputLog::new();
        log.notice(b"n".to_vec());
        log.report(b"r".to_vec());
        log.discard_outputs();

        let (outputs, reports) = log.into_parts();
        assert!(outputs.is_empty());
        assert_eq!(reports, vec![Report { payload: b"r".to_vec() }]);
    }

    #[test]
    fn notice_serializes_as_tagged_hex() {
        let output = Output::Notice(Notice {
            payload: b"hi".to_vec(),
        });
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["type"], "notice");
        assert_eq!(json["payload"], "0x6869");
    }
}

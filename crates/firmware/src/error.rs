use vexplot_protocol::Opcode;

use crate::calibrate::Phase;

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("protocol error: {0}")]
    Protocol(#[from] vexplot_protocol::Error),
    #[error("gave up on the {opcode:?} payload after receiving {received} of {expected} bytes")]
    IncompletePayload {
        opcode: Opcode,
        received: usize,
        expected: usize,
    },
    #[error("calibration timed out while waiting for {0}")]
    CalibrationTimeout(Phase),
}

impl Error {
    /// Fatal errors leave the plotter in a state we can't recover from
    /// without someone looking at it. After one of these we stop
    /// processing commands.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Protocol(_) | Error::CalibrationTimeout(_) => true,
            Error::IncompletePayload { .. } => false,
        }
    }
}

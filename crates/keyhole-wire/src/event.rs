/// Clock reading reserved to mean "unavailable on this platform".
///
/// The value is passed through the codec unmodified and must never be
/// interpreted as a real duration.
pub const CLOCK_UNAVAILABLE: f64 = -1.0;

/// Trace event exchanged between a publisher and a subscriber session.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Rendezvous frame, published repeatedly during the startup
    /// handshake and discarded afterwards.
    Sync,

    /// Session start, carrying the collector's output target.
    Start {
        /// Where the downstream consumer should write its output.
        output_target: String,
    },

    /// Session stop.
    Stop,

    /// A method call was observed by the instrumentation source.
    Call {
        /// Name of the class owning the called method.
        class_name: String,

        /// Name of the called method.
        method_name: String,

        /// Wall clock reading, in nanoseconds.
        wall_ns: f64,

        /// CPU clock reading, in nanoseconds.
        cpu_ns: f64,
    },

    /// A method return was observed by the instrumentation source.
    Return {
        /// Wall clock reading, in nanoseconds.
        wall_ns: f64,

        /// CPU clock reading, in nanoseconds.
        cpu_ns: f64,
    },
}

pub(crate) mod kind {
    pub const SYNC: u16 = 0;
    pub const START: u16 = 1;
    pub const STOP: u16 = 2;
    pub const CALL: u16 = 3;
    pub const RETURN: u16 = 4;
}

impl Event {
    /// Returns the wire discriminant of this event.
    pub fn kind(&self) -> u16 {
        match self {
            Self::Sync => kind::SYNC,
            Self::Start { .. } => kind::START,
            Self::Stop => kind::STOP,
            Self::Call { .. } => kind::CALL,
            Self::Return { .. } => kind::RETURN,
        }
    }

    /// Number of encoded sequence elements, discriminant included.
    pub(crate) fn element_count(&self) -> u8 {
        match self {
            Self::Sync | Self::Stop => 1,
            Self::Start { .. } => 2,
            Self::Return { .. } => 3,
            Self::Call { .. } => 5,
        }
    }
}

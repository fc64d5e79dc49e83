pub mod channel;
pub mod config;
pub mod coordinator;
pub mod metrics;
pub mod reservation;
pub mod testing;
pub mod timer;

pub use channel::{
    ChannelAdapter, ChannelError, DedupCache, SimulatedStatusTransport, StatusStream,
    StatusTransport, WsStatusTransport,
};
pub use config::{
    load_config, load_config_from_str, validate_config, BookingConfig, ChannelConfig, ChannelMode,
    Config, ConfigError, SanitizedConfig, ServerConfig, SimulatedChannelConfig, SimulatedOutcome,
    WsChannelConfig,
};
pub use coordinator::{
    Coordinator, CoordinatorConfig, CoordinatorError, CoordinatorHandle, ReservationUpdate,
    ReservationUpdateCallback,
};
pub use reservation::{
    FailureReason, HttpReservationClient, LineItem, PaymentInstructions, PaymentStatus, Recipient,
    ReservationClient, ReservationPhase, ReservationRequest, ReservationSnapshot,
    ReservationState, ReserveError, StatusEvent,
};
pub use timer::{DeadlineTimer, TimerError};

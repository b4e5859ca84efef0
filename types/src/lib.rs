pub mod channel;
pub mod gateway;
pub mod guild;
pub mod message;
pub mod ratelimit;
pub mod snowflake;
pub mod user;

pub use channel::*;
pub use gateway::*;
pub use guild::*;
pub use message::*;
pub use ratelimit::*;
pub use snowflake::*;
pub use user::*;

mod forward;

pub use forward::forward;

pub mod learning_switch;
pub mod mac_table;

pub use self::learning_switch::LearningSwitch;
pub use self::mac_table::{ForwardingTable, MacTableStore};

#[macro_use]
extern crate getset;

#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate log;

#[macro_use]
extern crate enum_primitive_derive;
extern crate byteorder;
extern crate num_traits;
#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate bitfield;

pub mod app;
pub mod ctl;
pub mod ds;
pub mod err;

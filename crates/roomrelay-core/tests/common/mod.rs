#![allow(dead_code)]

pub mod fakes;
pub mod room_info_server;

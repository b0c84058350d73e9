//! Flutter bridge surface for ShwePOS.

pub mod api;

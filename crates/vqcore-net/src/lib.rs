#![allow(dead_code, unused_variables, unused_assignments, unused_mut)]
#![allow(clippy::needless_return, clippy::too_many_arguments, clippy::collapsible_if,
         clippy::collapsible_else_if, clippy::field_reassign_with_default,
         clippy::manual_range_contains, clippy::single_match, clippy::comparison_chain,
         clippy::identity_op, clippy::type_complexity, clippy::manual_clamp)]

// Platform/transport layer — converted from myq2-original/win32/, made
// cross-platform and pared down to the two drivers NetChan actually needs:
// a real UDP socket and an in-process loopback.

pub const MAX_LOOPBACK: usize = 4;

pub mod platform;
pub mod net_common;
pub mod net_udp;
pub mod net_loop;
pub mod net_io_thread;

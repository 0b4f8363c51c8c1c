// common.rs -- misc functions used throughout the engine: logging, the
// redirect buffer for rcon capture, SizeBuf read/write primitives, argument
// handling and the Qcommon_Init/Frame/Shutdown tick shape.

use std::sync::Mutex;

use crate::cvar::{cvar_get, cvar_variable_value};
use crate::qcommon::{SizeBuf, BUILDSTRING, CPUSTRING, ERR_DROP, ERR_FATAL};

pub const MAXPRINTMSG: usize = 4096;
pub const MAX_NUM_ARGVS: usize = 50;

pub const DISTNAME: &str = "vqcore";
pub const DISTVER: f32 = 1.0;

// ============================================================
// Redirect buffer for Com_Printf
// ============================================================

static RD_BUFFER: Mutex<Option<String>> = Mutex::new(None);

/// Begin redirecting printf output into a buffer.
pub fn com_begin_redirect() {
    let mut buf = RD_BUFFER.lock().unwrap();
    *buf = Some(String::new());
}

/// End redirect and return the captured output.
pub fn com_end_redirect() -> Option<String> {
    let mut buf = RD_BUFFER.lock().unwrap();
    buf.take()
}

// ============================================================
// Com_Printf / Com_DPrintf / Com_Error
// ============================================================

/// General-purpose print function. Prints to stdout and appends to redirect
/// buffer if one is active.
pub fn com_printf(msg: &str) {
    {
        let mut buf = RD_BUFFER.lock().unwrap();
        if let Some(ref mut s) = *buf {
            s.push_str(msg);
            return;
        }
    }
    print!("{}", msg);
}

/// Developer-only print. Only prints when developer mode is active.
/// Controlled by the "developer" cvar.
pub fn com_dprintf(msg: &str) {
    if cvar_variable_value("developer") == 0.0 {
        return;
    }
    com_printf(msg);
}

/// Engine error handler.
/// - `ERR_FATAL`: prints to stderr and panics.
/// - `ERR_DROP`: prints the error (non-fatal, allows recovery).
/// - `ERR_QUIT` / unknown: clean exit.
pub fn com_error(code: i32, msg: &str) {
    if code == ERR_FATAL {
        eprintln!("Error: {}", msg);
        panic!("Fatal error: {}", msg);
    } else if code == ERR_DROP {
        eprintln!("********************\nERROR: {}\n********************", msg);
    } else {
        println!("{}", msg);
        std::process::exit(0);
    }
}

// ============================================================
// CopyString — trivial in Rust
// ============================================================

/// Equivalent of CopyString in C (Z_Malloc + strcpy). In Rust, just clone.
pub fn copy_string(s: &str) -> String {
    String::from(s)
}

// ============================================================
// Z_Free — no-op in Rust
// ============================================================

/// No-op in Rust. Memory is managed automatically by the borrow checker / Drop.
/// Kept for API compatibility with the C codebase.
pub fn z_free<T>(_ptr: T) {}

// ============================================================
// SizeBuf operations
// ============================================================

impl SizeBuf {
    /// Get writable space in the buffer. Returns start offset of the space.
    pub fn get_space(&mut self, length: usize) -> Option<usize> {
        let cursize = self.cursize as usize;
        let maxsize = self.maxsize as usize;

        if cursize + length > maxsize {
            if !self.allow_overflow {
                panic!("SZ_GetSpace: overflow without allowoverflow set");
            }
            if length > maxsize {
                panic!("SZ_GetSpace: {} is > full buffer size", length);
            }
            com_printf("SZ_GetSpace: overflow\n");
            self.clear();
            self.overflowed = true;
        }

        let start = self.cursize as usize;
        self.cursize += length as i32;
        Some(start)
    }

    /// Write raw bytes into the buffer.
    pub fn write(&mut self, src: &[u8]) {
        if let Some(start) = self.get_space(src.len()) {
            self.data[start..start + src.len()].copy_from_slice(src);
        }
    }

    /// Append a null-terminated string, merging trailing nulls.
    pub fn print(&mut self, s: &str) {
        let bytes = s.as_bytes();
        let len = bytes.len() + 1; // include null terminator

        let cursize = self.cursize as usize;
        if cursize > 0 && self.data[cursize - 1] == 0 {
            if let Some(start) = self.get_space(len - 1) {
                let dest_start = start - 1;
                self.data[dest_start..dest_start + bytes.len()].copy_from_slice(bytes);
                self.data[dest_start + bytes.len()] = 0;
            }
        } else if let Some(start) = self.get_space(len) {
            self.data[start..start + bytes.len()].copy_from_slice(bytes);
            self.data[start + bytes.len()] = 0;
        }
    }
}

// ============================================================
// MSG write functions — network byte order (big-endian)
// ============================================================

pub fn msg_write_char(sb: &mut SizeBuf, c: i32) {
    if let Some(start) = sb.get_space(1) {
        sb.data[start] = c as u8;
    }
}

pub fn msg_write_byte(sb: &mut SizeBuf, c: i32) {
    if let Some(start) = sb.get_space(1) {
        sb.data[start] = c as u8;
    }
}

pub fn msg_write_short(sb: &mut SizeBuf, c: i32) {
    if let Some(start) = sb.get_space(2) {
        sb.data[start..start + 2].copy_from_slice(&(c as i16).to_be_bytes());
    }
}

pub fn msg_write_long(sb: &mut SizeBuf, c: i32) {
    if let Some(start) = sb.get_space(4) {
        sb.data[start..start + 4].copy_from_slice(&c.to_be_bytes());
    }
}

pub fn msg_write_float(sb: &mut SizeBuf, f: f32) {
    if let Some(start) = sb.get_space(4) {
        sb.data[start..start + 4].copy_from_slice(&f.to_be_bytes());
    }
}

pub fn msg_write_string(sb: &mut SizeBuf, s: &str) {
    let bytes = s.as_bytes();
    sb.write(bytes);
    sb.write(&[0]); // null terminator
}

pub fn msg_write_coord(sb: &mut SizeBuf, f: f32) {
    msg_write_short(sb, (f * 8.0) as i32);
}

pub fn msg_write_pos(sb: &mut SizeBuf, pos: &[f32; 3]) {
    msg_write_short(sb, (pos[0] * 8.0) as i32);
    msg_write_short(sb, (pos[1] * 8.0) as i32);
    msg_write_short(sb, (pos[2] * 8.0) as i32);
}

pub fn msg_write_angle(sb: &mut SizeBuf, f: f32) {
    msg_write_byte(sb, ((f * 256.0 / 360.0) as i32) & 255);
}

pub fn msg_write_angle16(sb: &mut SizeBuf, f: f32) {
    msg_write_short(sb, ((f * 65536.0 / 360.0) as i32) & 65535);
}

// ============================================================
// MSG read functions — network byte order (big-endian)
// ============================================================

pub fn msg_begin_reading(msg: &mut SizeBuf) {
    msg.readcount = 0;
}

pub fn msg_read_char(msg: &mut SizeBuf) -> i32 {
    let rc = msg.readcount as usize;
    let cs = msg.cursize as usize;
    msg.readcount += 1;
    if rc + 1 > cs {
        -1
    } else {
        msg.data[rc] as i8 as i32
    }
}

pub fn msg_read_byte(msg: &mut SizeBuf) -> i32 {
    let rc = msg.readcount as usize;
    let cs = msg.cursize as usize;
    msg.readcount += 1;
    if rc + 1 > cs {
        -1
    } else {
        msg.data[rc] as i32
    }
}

pub fn msg_read_short(msg: &mut SizeBuf) -> i32 {
    let rc = msg.readcount as usize;
    let cs = msg.cursize as usize;
    msg.readcount += 2;
    if rc + 2 > cs {
        -1
    } else {
        i16::from_be_bytes([msg.data[rc], msg.data[rc + 1]]) as i32
    }
}

pub fn msg_read_long(msg: &mut SizeBuf) -> i32 {
    let rc = msg.readcount as usize;
    let cs = msg.cursize as usize;
    msg.readcount += 4;
    if rc + 4 > cs {
        -1
    } else {
        i32::from_be_bytes([msg.data[rc], msg.data[rc + 1], msg.data[rc + 2], msg.data[rc + 3]])
    }
}

pub fn msg_read_float(msg: &mut SizeBuf) -> f32 {
    let rc = msg.readcount as usize;
    let cs = msg.cursize as usize;
    msg.readcount += 4;
    if rc + 4 > cs {
        -1.0
    } else {
        f32::from_be_bytes([msg.data[rc], msg.data[rc + 1], msg.data[rc + 2], msg.data[rc + 3]])
    }
}

pub fn msg_read_string(msg: &mut SizeBuf) -> String {
    let mut result = String::new();
    loop {
        let c = msg_read_char(msg);
        if c == -1 || c == 0 {
            break;
        }
        result.push(c as u8 as char);
        if result.len() >= 2047 {
            break;
        }
    }
    result
}

pub fn msg_read_string_line(msg: &mut SizeBuf) -> String {
    let mut result = String::new();
    loop {
        let c = msg_read_char(msg);
        if c == -1 || c == 0 || c == b'\n' as i32 {
            break;
        }
        result.push(c as u8 as char);
        if result.len() >= 2047 {
            break;
        }
    }
    result
}

pub fn msg_read_coord(msg: &mut SizeBuf) -> f32 {
    msg_read_short(msg) as f32 * (1.0 / 8.0)
}

pub fn msg_read_pos(msg: &mut SizeBuf) -> [f32; 3] {
    [
        msg_read_short(msg) as f32 * (1.0 / 8.0),
        msg_read_short(msg) as f32 * (1.0 / 8.0),
        msg_read_short(msg) as f32 * (1.0 / 8.0),
    ]
}

pub fn msg_read_angle(msg: &mut SizeBuf) -> f32 {
    msg_read_char(msg) as f32 * (360.0 / 256.0)
}

pub fn msg_read_angle16(msg: &mut SizeBuf) -> f32 {
    msg_read_short(msg) as f32 * (360.0 / 65536.0)
}

pub fn msg_read_data(msg: &mut SizeBuf, len: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(len);
    for _ in 0..len {
        data.push(msg_read_byte(msg) as u8);
    }
    data
}

// ============================================================
// COM argument handling
// ============================================================

pub struct ComArgs {
    pub argc: usize,
    pub argv: Vec<String>,
}

impl ComArgs {
    pub fn new() -> Self {
        Self {
            argc: 0,
            argv: Vec::new(),
        }
    }

    pub fn init(&mut self, args: &[String]) {
        self.argc = args.len().min(MAX_NUM_ARGVS);
        self.argv = args[..self.argc].to_vec();
    }

    pub fn com_argc(&self) -> usize {
        self.argc
    }

    pub fn com_argv(&self, arg: usize) -> &str {
        if arg >= self.argc {
            ""
        } else {
            &self.argv[arg]
        }
    }

    pub fn com_clear_argv(&mut self, arg: usize) {
        if arg < self.argc {
            self.argv[arg] = String::new();
        }
    }
}

impl Default for ComArgs {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================
// Info_Print — pretty-print an info string, one key/value per line
// ============================================================

pub fn info_print(s: &str) {
    let bytes = s.as_bytes();
    let mut pos = 0;

    if pos < bytes.len() && bytes[pos] == b'\\' {
        pos += 1;
    }

    while pos < bytes.len() {
        let mut key = String::new();
        while pos < bytes.len() && bytes[pos] != b'\\' {
            key.push(bytes[pos] as char);
            pos += 1;
        }

        if key.len() < 20 {
            key.extend(std::iter::repeat_n(' ', 20 - key.len()));
        }
        com_printf(&key);

        if pos >= bytes.len() {
            com_printf("MISSING VALUE\n");
            return;
        }

        pos += 1; // skip backslash

        let mut value = String::new();
        while pos < bytes.len() && bytes[pos] != b'\\' {
            value.push(bytes[pos] as char);
            pos += 1;
        }

        if pos < bytes.len() {
            pos += 1; // skip trailing backslash
        }

        com_printf(&format!("{}\n", value));
    }
}

// ============================================================
// Server state (global in C, managed here)
// ============================================================

pub struct CommonState {
    pub server_state: i32,
    pub realtime: i32,
    pub args: ComArgs,
}

impl CommonState {
    pub fn new() -> Self {
        Self {
            server_state: 0,
            realtime: 0,
            args: ComArgs::new(),
        }
    }

    pub fn server_state(&self) -> i32 {
        self.server_state
    }

    pub fn set_server_state(&mut self, state: i32) {
        self.server_state = state;
    }
}

impl Default for CommonState {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================
// Qcommon_Init / Qcommon_Frame / Qcommon_Shutdown
// ============================================================

static COMMON_STATE: Mutex<Option<CommonState>> = Mutex::new(None);

/// Set the server state in the global common state.
pub fn com_set_server_state(state: i32) {
    let mut global = COMMON_STATE.lock().unwrap();
    if let Some(ref mut s) = *global {
        s.set_server_state(state);
    }
}

/// Get the server state from the global common state.
pub fn com_server_state() -> i32 {
    let global = COMMON_STATE.lock().unwrap();
    global.as_ref().map_or(0, |s| s.server_state())
}

/// Initialize engine subsystems: command buffer, command system, cvars, the
/// ambient cvar set every mode relies on.
pub fn qcommon_init(args: &[String]) {
    let mut state = CommonState::new();
    state.args.init(args);

    crate::cmd::cmd_init();
    crate::cvar::cvar_init();

    crate::cmd::with_cmd_ctx(|cmd| {
        cmd.cbuf_add_early_commands(&mut state.args, true);
    });
    crate::cmd::cbuf_execute();
    crate::cvar::cvar_get_latched_vars();

    let version_string = format!("{} v{:.1} {} {}", DISTNAME, DISTVER, CPUSTRING, BUILDSTRING);
    cvar_get(
        "version",
        &version_string,
        crate::infostring::CVAR_SERVERINFO | crate::infostring::CVAR_NOSET,
    );
    cvar_get("dedicated", "0", crate::infostring::CVAR_NOSET);
    cvar_get("developer", "0", crate::infostring::CVAR_ZERO);

    crate::cmd::with_cmd_ctx(|cmd| {
        cmd.cbuf_add_late_commands(&state.args);
    });
    crate::cmd::cbuf_execute();

    com_printf("====== Qcommon Initialized ======\n");

    let mut global = COMMON_STATE.lock().unwrap();
    *global = Some(state);
}

/// Run a single engine frame: drain the deferred command buffer, leave
/// subsystem ticks (NetChan/NetDisco/TaskSys) to the caller's own loop.
pub fn qcommon_frame(msec: i32) {
    let mut global = COMMON_STATE.lock().unwrap();
    if let Some(ref mut state) = *global {
        state.realtime += msec;
        crate::cmd::cbuf_execute();
    }
}

/// Clean shutdown of the engine.
pub fn qcommon_shutdown() {
    let mut global = COMMON_STATE.lock().unwrap();
    *global = None;
}

// ============================================================
// Sys_Milliseconds — canonical process-wide timer
// ============================================================

/// Returns a monotonically increasing time value relative to a process-wide
/// epoch, set on first call.
pub fn sys_milliseconds() -> i32 {
    use std::sync::OnceLock;
    use std::time::Instant;
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_millis() as i32
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msg_write_read_char() {
        let mut sb = SizeBuf::new(64);
        msg_write_char(&mut sb, -5);
        msg_begin_reading(&mut sb);
        assert_eq!(msg_read_char(&mut sb), -5);
    }

    #[test]
    fn test_msg_write_read_byte() {
        let mut sb = SizeBuf::new(64);
        msg_write_byte(&mut sb, 200);
        msg_begin_reading(&mut sb);
        assert_eq!(msg_read_byte(&mut sb), 200);
    }

    #[test]
    fn test_msg_write_read_short() {
        let mut sb = SizeBuf::new(64);
        msg_write_short(&mut sb, -1234);
        msg_begin_reading(&mut sb);
        assert_eq!(msg_read_short(&mut sb), -1234);
    }

    #[test]
    fn test_msg_write_read_long() {
        let mut sb = SizeBuf::new(64);
        msg_write_long(&mut sb, 0x12345678);
        msg_begin_reading(&mut sb);
        assert_eq!(msg_read_long(&mut sb), 0x12345678);
    }

    #[test]
    fn test_msg_write_read_float() {
        let mut sb = SizeBuf::new(64);
        msg_write_float(&mut sb, 3.14);
        msg_begin_reading(&mut sb);
        let val = msg_read_float(&mut sb);
        assert!((val - 3.14).abs() < 0.001);
    }

    #[test]
    fn test_msg_write_read_string() {
        let mut sb = SizeBuf::new(256);
        msg_write_string(&mut sb, "hello world");
        msg_begin_reading(&mut sb);
        assert_eq!(msg_read_string(&mut sb), "hello world");
    }

    #[test]
    fn test_msg_read_overflow() {
        let mut sb = SizeBuf::new(64);
        msg_begin_reading(&mut sb);
        assert_eq!(msg_read_byte(&mut sb), -1);
    }

    #[test]
    fn test_msg_coord_roundtrip() {
        let mut sb = SizeBuf::new(64);
        msg_write_coord(&mut sb, 100.5);
        msg_begin_reading(&mut sb);
        let val = msg_read_coord(&mut sb);
        assert!((val - 100.5).abs() < 0.2); // coord precision is 1/8
    }

    #[test]
    fn test_msg_write_short_is_big_endian() {
        let mut sb = SizeBuf::new(64);
        msg_write_short(&mut sb, 0x0102);
        assert_eq!(&sb.data[0..2], &[0x01, 0x02]);
    }

    #[test]
    fn test_msg_write_long_is_big_endian() {
        let mut sb = SizeBuf::new(64);
        msg_write_long(&mut sb, 0x01020304);
        assert_eq!(&sb.data[0..4], &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_msg_coord_round_trip_matches_c() {
        let test_values: &[f32] = &[
            0.0, 1.0, -1.0, 100.5, -100.5, 0.125, -0.125, 0.0625, 1000.0, -1000.0, 4095.875,
            -4095.875,
        ];
        for &f in test_values {
            let mut sb = SizeBuf::new(64);
            msg_write_coord(&mut sb, f);
            msg_begin_reading(&mut sb);
            let result = msg_read_coord(&mut sb);

            let c_encoded = (f * 8.0) as i32;
            let c_expected = c_encoded as f32 * 0.125;
            assert!(
                (result - c_expected).abs() < f32::EPSILON,
                "coord round-trip mismatch for {}: got {}, expected {}",
                f, result, c_expected
            );
        }
    }

    #[test]
    fn test_msg_angle_round_trip_matches_c() {
        let test_angles: &[f32] = &[
            0.0, 45.0, 90.0, 180.0, 270.0, 359.0, -45.0, -90.0, 360.0, 720.0, 1.40625,
        ];
        for &f in test_angles {
            let mut sb = SizeBuf::new(64);
            msg_write_angle(&mut sb, f);
            msg_begin_reading(&mut sb);
            let result = msg_read_angle(&mut sb);

            let c_encoded = ((f * 256.0 / 360.0) as i32) & 255;
            let c_expected = (c_encoded as i8) as f32 * (360.0 / 256.0);
            assert!(
                (result - c_expected).abs() < 0.001,
                "angle round-trip mismatch for {}: got {}, expected {} (encoded byte={})",
                f, result, c_expected, c_encoded
            );
        }
    }

    #[test]
    fn test_msg_angle16_round_trip_matches_c() {
        let test_angles: &[f32] = &[0.0, 45.0, 90.0, 180.0, 270.0, 359.0, -45.0, 360.0];
        for &f in test_angles {
            let mut sb = SizeBuf::new(64);
            msg_write_angle16(&mut sb, f);
            msg_begin_reading(&mut sb);
            let result = msg_read_angle16(&mut sb);

            let c_encoded = ((f * 65536.0 / 360.0) as i32) & 65535;
            let c_expected = (c_encoded as i16) as f32 * (360.0 / 65536.0);
            assert!(
                (result - c_expected).abs() < 0.01,
                "angle16 round-trip mismatch for {}: got {}, expected {} (encoded={})",
                f, result, c_expected, c_encoded
            );
        }
    }

    #[test]
    fn test_msg_write_byte_overflow_truncation() {
        let mut sb = SizeBuf::new(64);
        msg_write_byte(&mut sb, 256);
        msg_begin_reading(&mut sb);
        assert_eq!(msg_read_byte(&mut sb), 0);

        let mut sb = SizeBuf::new(64);
        msg_write_byte(&mut sb, 300);
        msg_begin_reading(&mut sb);
        assert_eq!(msg_read_byte(&mut sb), 44);

        let mut sb = SizeBuf::new(64);
        msg_write_byte(&mut sb, -1);
        msg_begin_reading(&mut sb);
        assert_eq!(msg_read_byte(&mut sb), 255);
    }

    #[test]
    fn test_msg_write_short_overflow_truncation() {
        let mut sb = SizeBuf::new(64);
        msg_write_short(&mut sb, 32768);
        msg_begin_reading(&mut sb);
        assert_eq!(msg_read_short(&mut sb), -32768);

        let mut sb = SizeBuf::new(64);
        msg_write_short(&mut sb, 65535);
        msg_begin_reading(&mut sb);
        assert_eq!(msg_read_short(&mut sb), -1);
    }

    #[test]
    fn test_sizebuf_overflow_detection() {
        let mut sb = SizeBuf::new(4);
        sb.allow_overflow = true;

        msg_write_long(&mut sb, 0x12345678);
        assert!(!sb.overflowed);
        assert_eq!(sb.cursize, 4);

        msg_write_byte(&mut sb, 0);
        assert!(sb.overflowed);
    }

    #[test]
    #[should_panic(expected = "overflow without allowoverflow set")]
    fn test_sizebuf_overflow_panic_without_allow() {
        let mut sb = SizeBuf::new(4);
        msg_write_long(&mut sb, 0x12345678);
        msg_write_byte(&mut sb, 0);
    }

    #[test]
    fn test_msg_read_short_overflow() {
        let mut sb = SizeBuf::new(64);
        msg_write_byte(&mut sb, 0x42);
        msg_begin_reading(&mut sb);
        let val = msg_read_short(&mut sb);
        assert_eq!(val, -1);
    }

    #[test]
    fn test_msg_read_long_overflow() {
        let mut sb = SizeBuf::new(64);
        msg_write_short(&mut sb, 0x1234);
        msg_begin_reading(&mut sb);
        let val = msg_read_long(&mut sb);
        assert_eq!(val, -1);
    }

    #[test]
    fn test_msg_read_float_overflow() {
        let mut sb = SizeBuf::new(64);
        msg_write_byte(&mut sb, 0);
        msg_begin_reading(&mut sb);
        let val = msg_read_float(&mut sb);
        assert_eq!(val, -1.0);
    }

    #[test]
    fn test_msg_write_read_string_empty() {
        let mut sb = SizeBuf::new(64);
        msg_write_string(&mut sb, "");
        msg_begin_reading(&mut sb);
        assert_eq!(msg_read_string(&mut sb), "");
    }

    #[test]
    fn test_msg_write_read_string_with_backslash() {
        let mut sb = SizeBuf::new(256);
        msg_write_string(&mut sb, "\\name\\player");
        msg_begin_reading(&mut sb);
        assert_eq!(msg_read_string(&mut sb), "\\name\\player");
    }

    #[test]
    fn test_msg_pos_round_trip() {
        let pos: [f32; 3] = [100.5, -200.25, 50.125];
        let mut sb = SizeBuf::new(64);
        msg_write_pos(&mut sb, &pos);
        msg_begin_reading(&mut sb);
        let result = msg_read_pos(&mut sb);

        for i in 0..3 {
            let c_encoded = (pos[i] * 8.0) as i32;
            let c_expected = c_encoded as f32 * 0.125;
            assert!(
                (result[i] - c_expected).abs() < f32::EPSILON,
                "pos[{}] mismatch: got {}, expected {}",
                i, result[i], c_expected
            );
        }
    }

    #[test]
    fn test_sizebuf_print_merges_trailing_null() {
        let mut sb = SizeBuf::new(128);
        sb.print("hello");
        let size_after_first = sb.cursize;

        sb.print(" world");
        let expected_size = "hello world".len() as i32 + 1;
        assert_eq!(
            sb.cursize, expected_size,
            "SizeBuf::print should merge trailing nulls like C SZ_Print. \
             first_size={}, total={}, expected={}",
            size_after_first, sb.cursize, expected_size
        );
    }
}

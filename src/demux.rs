//! Frame demultiplexer for the shared serial stream.
//!
//! The device interleaves both sub-protocols on one wire: HEX frames are
//! `:` ... `\n`, TEXT lines are `\n` <tag> TAB <value> `\r`. This state
//! machine consumes one byte at a time, buffers until a complete frame or
//! line is recognised, and resynchronises on any unexpected sentinel instead
//! of failing. It consumes exactly what it is offered and is resumable
//! across calls, so the caller can feed it whatever happens to be available.

/// A completed unit of input, ready for the codec.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    /// A HEX frame payload, `:` and `\n` stripped.
    Hex(String),
    /// A TEXT line, leading `\n` and terminating `\r` stripped.
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingStart,
    InHexFrame,
    InTextLine,
}

/// Upper bound on a buffered frame. Anything longer is a stream that lost
/// its terminator; excess bytes are dropped and checksum verification
/// rejects the mangled frame.
const MAX_FRAME_LEN: usize = 128;

pub struct Demux {
    state: State,
    buffer: String,
}

impl Demux {
    pub fn new() -> Self {
        Self {
            state: State::AwaitingStart,
            buffer: String::new(),
        }
    }

    /// Feed one input byte. Returns a frame when this byte completes one.
    pub fn push(&mut self, byte: u8) -> Option<Frame> {
        match self.state {
            State::AwaitingStart => {
                match byte {
                    b':' => {
                        self.buffer.clear();
                        self.state = State::InHexFrame;
                    }
                    // A bare newline at top level opens a TEXT line
                    b'\n' => {
                        self.buffer.clear();
                        self.state = State::InTextLine;
                    }
                    _ => {}
                }
                None
            }

            State::InHexFrame => match byte {
                b'\n' => {
                    self.state = State::AwaitingStart;
                    Some(Frame::Hex(std::mem::take(&mut self.buffer)))
                }
                // New frame began before the previous one finished
                b':' => {
                    self.buffer.clear();
                    None
                }
                b' '..=b'~' => {
                    self.append(byte);
                    None
                }
                // Line noise, drop without changing state
                _ => None,
            },

            State::InTextLine => match byte {
                b'\r' => {
                    self.state = State::AwaitingStart;
                    Some(Frame::Text(std::mem::take(&mut self.buffer)))
                }
                // New line began before the previous one finished
                b'\n' => {
                    self.buffer.clear();
                    None
                }
                // The TEXT stream yields to an interleaved HEX frame
                b':' => {
                    self.buffer.clear();
                    self.state = State::InHexFrame;
                    None
                }
                _ => {
                    self.append(byte);
                    None
                }
            },
        }
    }

    fn append(&mut self, byte: u8) {
        if self.buffer.len() < MAX_FRAME_LEN {
            self.buffer.push(byte as char);
        }
    }
}

impl Default for Demux {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
fn feed(demux: &mut Demux, bytes: &[u8]) -> Vec<Frame> {
    bytes.iter().filter_map(|&b| demux.push(b)).collect()
}

#[test]
fn test_hex_frame() {
    let mut demux = Demux::new();
    let frames = feed(&mut demux, b":7FF0F00E40E92\n");
    assert_eq!(frames, vec![Frame::Hex("7FF0F00E40E92".to_string())]);
}

#[test]
fn test_text_line() {
    let mut demux = Demux::new();
    let frames = feed(&mut demux, b"\nSOC\t950\r");
    assert_eq!(frames, vec![Frame::Text("SOC\t950".to_string())]);
}

#[test]
fn test_garbage_before_start_ignored() {
    let mut demux = Demux::new();
    let frames = feed(&mut demux, b"xx\x00yy:7AB12\n");
    assert_eq!(frames, vec![Frame::Hex("7AB12".to_string())]);
}

#[test]
fn test_hex_restart_discards_partial_frame() {
    // A ':' before the previous frame's terminator resynchronises
    let mut demux = Demux::new();
    let frames = feed(&mut demux, b":AB:7FF0F00E40E92\n");
    assert_eq!(frames, vec![Frame::Hex("7FF0F00E40E92".to_string())]);
}

#[test]
fn test_text_yields_to_interleaved_hex() {
    let mut demux = Demux::new();
    let frames = feed(&mut demux, b"\nSOC\t9:7AB12\n");
    assert_eq!(frames, vec![Frame::Hex("7AB12".to_string())]);
}

#[test]
fn test_text_newline_clears_line() {
    // The '\n' mid-line starts a fresh TEXT line; the partial one is lost
    let mut demux = Demux::new();
    let frames = feed(&mut demux, b"\nSOC\t9\nAlarm\tON\r");
    assert_eq!(frames, vec![Frame::Text("Alarm\tON".to_string())]);
}

#[test]
fn test_nonprintable_dropped_inside_hex() {
    let mut demux = Demux::new();
    let frames = feed(&mut demux, b":7A\x01B\x7f12\n");
    assert_eq!(frames, vec![Frame::Hex("7AB12".to_string())]);
}

#[test]
fn test_arbitrary_interleaving() {
    let mut demux = Demux::new();
    let frames = feed(&mut demux, b"\nV\t12800\r:7AB\n\nI\t---\r");
    assert_eq!(
        frames,
        vec![
            Frame::Text("V\t12800".to_string()),
            Frame::Hex("7AB".to_string()),
            Frame::Text("I\t---".to_string()),
        ]
    );
}

#[test]
fn test_resumable_across_calls() {
    let mut demux = Demux::new();
    assert!(feed(&mut demux, b":7FF0F").is_empty());
    let frames = feed(&mut demux, b"00E40E92\n");
    assert_eq!(frames, vec![Frame::Hex("7FF0F00E40E92".to_string())]);
}

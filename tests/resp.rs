use emberkv::*;

fn read_all(bytes: &[u8]) -> Vec<Frame> {
    let mut reader = FrameReader::new(bytes);
    let mut frames = Vec::new();
    while let Some(frame) = reader.read().unwrap() {
        frames.push(frame);
    }
    frames
}

#[test]
fn parse_ping_and_set_get() {
    let mut buf = Vec::new();
    buf.extend_from_slice(b"*1\r\n$4\r\nPING\r\n");
    buf.extend_from_slice(b"*3\r\n$3\r\nSET\r\n$1\r\na\r\n$1\r\n1\r\n");
    buf.extend_from_slice(b"*2\r\n$3\r\nGET\r\n$1\r\na\r\n");
    let frames = read_all(&buf);
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0], Frame::command(&["PING"]));
    assert_eq!(frames[1], Frame::command(&["SET", "a", "1"]));
    assert_eq!(frames[2].command_name().unwrap(), "GET");
}

#[test]
fn encode_decode_round_trip() {
    // Arrays may nest every variant; the reply array of an EXEC does.
    let frames = vec![
        Frame::bulk(&b"opaque \x00 bytes"[..]),
        Frame::bulk(""),
        Frame::Null,
        Frame::Array(vec![
            Frame::simple("OK"),
            Frame::error("ERR key doesn't exist"),
            Frame::Integer(-42),
            Frame::bulk("payload"),
            Frame::Array(vec![Frame::simple("nested")]),
        ]),
        Frame::command(&["HSET", "user", "name", "alice"]),
    ];
    for frame in frames {
        let wire = frame.encode();
        let mut reader = FrameReader::new(&wire[..]);
        assert_eq!(reader.read().unwrap(), Some(frame.clone()));
        assert!(reader.read().unwrap().is_none());
        // decode ∘ encode is the identity on the wire too
        let decoded = FrameReader::new(&wire[..]).read().unwrap().unwrap();
        assert_eq!(decoded.encode(), wire);
    }
}

#[test]
fn serialization_forms() {
    assert_eq!(Frame::simple("PONG").encode(), b"+PONG\r\n");
    assert_eq!(Frame::error("ERR boom").encode(), b"-ERR boom\r\n");
    assert_eq!(Frame::Integer(7).encode(), b":7\r\n");
    assert_eq!(Frame::bulk("bar").encode(), b"$3\r\nbar\r\n");
    assert_eq!(Frame::Null.encode(), b"$-1\r\n");
    assert_eq!(
        Frame::Array(vec![Frame::bulk("a"), Frame::bulk("b")]).encode(),
        b"*2\r\n$1\r\na\r\n$1\r\nb\r\n"
    );
}

#[test]
fn null_bulk_decodes() {
    let mut reader = FrameReader::new(&b"$-1\r\n"[..]);
    assert_eq!(reader.read().unwrap(), Some(Frame::Null));
}

#[test]
fn top_level_rejects_reply_tags() {
    // Clients only send arrays and bulks; anything else is a protocol error.
    for wire in [&b"+OK\r\n"[..], b"-ERR nope\r\n", b":1\r\n", b"?\r\n"] {
        let mut reader = FrameReader::new(wire);
        assert!(matches!(reader.read(), Err(Error::Protocol(_))));
    }
}

#[test]
fn empty_input_is_clean_end() {
    let mut reader = FrameReader::new(&b""[..]);
    assert!(reader.read().unwrap().is_none());
}

#[test]
fn truncated_frame_is_an_error() {
    // An array header promising more elements than the input carries.
    let mut reader = FrameReader::new(&b"*2\r\n$3\r\nSET\r\n"[..]);
    assert!(matches!(reader.read(), Err(Error::Io(_))));

    // A bulk body cut short.
    let mut reader = FrameReader::new(&b"$5\r\nab"[..]);
    assert!(matches!(reader.read(), Err(Error::Io(_))));
}

#[test]
fn malformed_lengths_are_protocol_errors() {
    for wire in [&b"*x\r\n"[..], b"$-3\r\nabc\r\n", b"$+2\r\nab\r\n", b"*1\n$1\r\na\r\n"] {
        let mut reader = FrameReader::new(wire);
        assert!(matches!(reader.read(), Err(Error::Protocol(_))), "{wire:?}");
    }
}

#[test]
fn bulk_payload_may_contain_crlf() {
    let frame = Frame::command(&["SET", "k", "line1\r\nline2"]);
    let wire = frame.encode();
    assert_eq!(
        FrameReader::new(&wire[..]).read().unwrap(),
        Some(frame)
    );
}

use emberkv::*;
use std::sync::Arc;
use tempfile::TempDir;

fn open_aof(dir: &TempDir) -> Arc<Aof> {
    Aof::open(dir.path().join("database.aof")).unwrap()
}

fn set(k: &str, v: &str) -> Frame {
    Frame::command(&["SET", k, v])
}

/// The extents must tile `[0, len)` exactly: contiguous, disjoint, in
/// offset order.
fn assert_index_coverage(aof: &Aof) {
    let mut cursor = 0;
    for (key, (start, end)) in aof.extents() {
        assert_eq!(start, cursor, "gap or overlap before record for {key:?}");
        assert!(end > start);
        cursor = end;
    }
    assert_eq!(cursor, aof.len());
}

#[test]
fn appends_index_new_keys() {
    let dir = TempDir::new().unwrap();
    let aof = open_aof(&dir);

    aof.write(&set("a", "1")).unwrap();
    aof.write(&set("b", "2")).unwrap();
    aof.write(&Frame::command(&["HSET", "u", "name", "alice"]))
        .unwrap();

    let extents = aof.extents();
    assert_eq!(extents.len(), 3);
    assert_eq!(extents[0].0, "a");
    assert_eq!(extents[1].0, "b");
    assert_eq!(extents[2].0, "u/name");
    assert_index_coverage(&aof);
}

#[test]
fn same_size_overwrite_is_in_place() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("database.aof");
    let aof = Aof::open(&path).unwrap();

    for value in ["1", "2", "3"] {
        aof.write(&set("counter", value)).unwrap();
    }
    aof.sync().unwrap();

    // After N equal-size writes the file equals the last write alone.
    assert_eq!(std::fs::read(&path).unwrap(), set("counter", "3").encode());
    assert_eq!(aof.extents().len(), 1);
    assert_index_coverage(&aof);
}

#[test]
fn grown_record_is_spliced_and_reappended() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("database.aof");
    let aof = Aof::open(&path).unwrap();

    aof.write(&set("a", "1")).unwrap();
    aof.write(&set("b", "2")).unwrap();
    aof.write(&set("a", "longer")).unwrap();
    aof.sync().unwrap();

    let mut expected = set("b", "2").encode();
    expected.extend_from_slice(&set("a", "longer").encode());
    assert_eq!(std::fs::read(&path).unwrap(), expected);

    let extents = aof.extents();
    assert_eq!(extents.len(), 2);
    assert_eq!(extents[0].0, "b");
    assert_eq!(extents[1].0, "a");
    assert_index_coverage(&aof);
}

#[test]
fn delete_splices_record_out() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("database.aof");
    let aof = Aof::open(&path).unwrap();

    aof.write(&set("a", "1")).unwrap();
    aof.write(&set("b", "2")).unwrap();
    aof.write(&set("c", "3")).unwrap();
    aof.delete(&Frame::command(&["DELETE", "b"])).unwrap();
    aof.sync().unwrap();

    // Exactly the two surviving records, contiguous from offset 0.
    let mut expected = set("a", "1").encode();
    expected.extend_from_slice(&set("c", "3").encode());
    assert_eq!(std::fs::read(&path).unwrap(), expected);

    let extents = aof.extents();
    assert_eq!(extents.len(), 2);
    assert_eq!(extents[0], ("a".to_string(), (0, 27)));
    assert_eq!(extents[1], ("c".to_string(), (27, 54)));
    assert_index_coverage(&aof);
}

#[test]
fn delete_of_unindexed_key_is_missing_offset() {
    let dir = TempDir::new().unwrap();
    let aof = open_aof(&dir);
    let err = aof.delete(&Frame::command(&["DELETE", "ghost"])).unwrap_err();
    assert!(matches!(err, Error::MissingOffset));
}

#[test]
fn replay_rebuilds_keyspace_and_index() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("database.aof");

    // Build state through the same path the session uses: log first, then
    // the handler.
    let store = Store::new();
    let aof = Aof::open(&path).unwrap();
    let mutate = |parts: &[&str]| {
        let frame = Frame::command(parts);
        let name = frame.command_name().unwrap();
        match name.as_str() {
            "SET" | "HSET" => aof.write(&frame).unwrap(),
            "DELETE" => aof.delete(&frame).unwrap(),
            _ => {}
        }
        lookup(&name).unwrap()(&store, frame.args());
    };
    mutate(&["SET", "foo", "bar"]);
    mutate(&["SET", "tmp", "x"]);
    mutate(&["HSET", "u", "name", "alice"]);
    mutate(&["DELETE", "tmp"]);
    mutate(&["SET", "foo", "baz"]);
    aof.close();
    drop(aof);

    // Fresh process: reopen and replay into an empty keyspace.
    let restored = Store::new();
    let aof = Aof::open(&path).unwrap();
    aof.replay(|frame| {
        let name = frame.command_name().unwrap();
        lookup(&name).unwrap()(&restored, frame.args());
    })
    .unwrap();

    assert_eq!(restored.get("foo").as_deref(), Some("baz"));
    assert_eq!(restored.get("tmp"), None);
    assert_eq!(restored.hget("u", "name").as_deref(), Some("alice"));
    assert_index_coverage(&aof);
}

#[test]
fn replay_stops_at_partial_trailing_frame() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("database.aof");

    let aof = Aof::open(&path).unwrap();
    aof.write(&set("a", "1")).unwrap();
    aof.close();
    drop(aof);

    // A crash mid-append leaves a torn frame at the tail.
    let mut bytes = std::fs::read(&path).unwrap();
    bytes.extend_from_slice(b"*3\r\n$3\r\nSET\r\n$1\r\nb");
    std::fs::write(&path, &bytes).unwrap();

    let store = Store::new();
    let aof = Aof::open(&path).unwrap();
    aof.replay(|frame| {
        let name = frame.command_name().unwrap();
        lookup(&name).unwrap()(&store, frame.args());
    })
    .unwrap();

    // Only the complete record made it back.
    assert_eq!(store.get("a").as_deref(), Some("1"));
    assert_eq!(store.get("b"), None);
    assert_eq!(aof.len(), set("a", "1").encode().len() as u64);
    assert_eq!(aof.extents().len(), 1);
}

#[test]
fn write_after_replay_appends_at_tail() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("database.aof");

    let aof = Aof::open(&path).unwrap();
    aof.write(&set("a", "1")).unwrap();
    drop(aof);

    let aof = Aof::open(&path).unwrap();
    aof.replay(|_| {}).unwrap();
    aof.write(&set("b", "2")).unwrap();
    aof.sync().unwrap();

    let mut expected = set("a", "1").encode();
    expected.extend_from_slice(&set("b", "2").encode());
    assert_eq!(std::fs::read(&path).unwrap(), expected);
    assert_index_coverage(&aof);
}

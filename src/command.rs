/*!
 * Command Catalog
 *
 * Static dispatch table from uppercase command name to handler. Handlers
 * are pure functions of the keyspace and their arguments and reply with a
 * single frame; persistence and replication happen before dispatch, in the
 * session layer.
 */

use crate::protocol::Frame;
use crate::storage::Store;

/// A command handler: `(keyspace, args) -> reply`.
pub type Handler = fn(&Store, &[Frame]) -> Frame;

/// Resolve an uppercase command name to its handler.
///
/// MULTI and EXEC are intercepted by the session before dispatch; MULTI
/// still resolves here so that a replayed or batched occurrence stays
/// harmless. COMMAND answers the handshake some clients send on connect.
pub fn lookup(name: &str) -> Option<Handler> {
    Some(match name {
        "PING" => ping,
        "SET" => set,
        "GET" => get,
        "DELETE" => delete,
        "HSET" => hset,
        "HGET" => hget,
        "HGETALL" => hgetall,
        "MULTI" | "COMMAND" => empty,
        _ => return None,
    })
}

fn wrong_arity(cmd: &str) -> Frame {
    Frame::error(format!(
        "ERR wrong number of arguments for '{cmd}' command"
    ))
}

fn ping(_store: &Store, args: &[Frame]) -> Frame {
    match args.first() {
        None => Frame::simple("PONG"),
        Some(arg) => Frame::simple(arg.bulk_text().into_owned()),
    }
}

fn set(store: &Store, args: &[Frame]) -> Frame {
    if args.len() != 2 {
        return wrong_arity("set");
    }
    store.set(
        args[0].bulk_text().into_owned(),
        args[1].bulk_text().into_owned(),
    );
    Frame::simple("OK")
}

fn get(store: &Store, args: &[Frame]) -> Frame {
    if args.len() != 1 {
        return wrong_arity("get");
    }
    match store.get(&args[0].bulk_text()) {
        Some(value) => Frame::simple(value),
        None => Frame::simple("null"),
    }
}

fn delete(store: &Store, args: &[Frame]) -> Frame {
    if args.len() != 1 {
        return wrong_arity("delete");
    }
    if store.delete(&args[0].bulk_text()) {
        Frame::simple("OK")
    } else {
        Frame::error("ERR key doesn't exist")
    }
}

fn hset(store: &Store, args: &[Frame]) -> Frame {
    if args.len() != 3 {
        return wrong_arity("hset");
    }
    store.hset(
        args[0].bulk_text().into_owned(),
        args[1].bulk_text().into_owned(),
        args[2].bulk_text().into_owned(),
    );
    Frame::simple("OK")
}

fn hget(store: &Store, args: &[Frame]) -> Frame {
    if args.len() != 2 {
        return wrong_arity("hget");
    }
    match store.hget(&args[0].bulk_text(), &args[1].bulk_text()) {
        Some(value) => Frame::simple(value),
        None => Frame::error("null"),
    }
}

fn hgetall(store: &Store, args: &[Frame]) -> Frame {
    let filter = (args.len() == 1).then(|| args[0].bulk_text().into_owned());
    let values = store.hash_values(filter.as_deref());
    Frame::Array(values.into_iter().map(Frame::Simple).collect())
}

fn empty(_store: &Store, _args: &[Frame]) -> Frame {
    Frame::simple("")
}

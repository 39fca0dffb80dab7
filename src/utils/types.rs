use std::collections::HashMap;

/// Network address of a node, an opaque `host:port` string compared by
/// equality.
pub type Address = String;

/// Key value storage, keyed by the original key string so responsibility
/// checks can always re-derive the key's ring position.
pub type KvStore = HashMap<String, String>;

use serde::{Deserialize, Serialize};

/// Entity id assigned by the backend server.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(i32);

impl EntityId {
    pub fn new(id: i32) -> Self {
        Self(id)
    }

    pub fn as_i32(self) -> i32 {
        self.0
    }
}

/// Entity id shown to the frontend client. The frontend protocol uses
/// 64-bit runtime ids, allocated by the bridge per session.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuntimeId(u64);

impl RuntimeId {
    /// The local player always has runtime id 1.
    pub const LOCAL_PLAYER: RuntimeId = RuntimeId(1);

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Hands out runtime ids. Id 1 is reserved for the local player.
#[derive(Debug)]
pub struct RuntimeIdAllocator {
    next: u64,
}

impl RuntimeIdAllocator {
    pub fn new() -> Self {
        Self { next: 2 }
    }

    pub fn allocate(&mut self) -> RuntimeId {
        let id = RuntimeId(self.next);
        self.next += 1;
        id
    }
}

impl Default for RuntimeIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

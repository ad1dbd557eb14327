//! Unit-test fixtures shared across modules

use shared::models::{Role, Staff, StaffCreate, Terminal};

use crate::auth::StaffDirectory;
use crate::db::Storage;
use crate::terminals::TerminalRegistry;

pub struct Fixture {
    pub storage: Storage,
    pub staff: StaffDirectory,
    pub terminals: TerminalRegistry,
}

impl Fixture {
    pub fn new() -> Self {
        let storage = Storage::open_in_memory().unwrap();
        Self {
            staff: StaffDirectory::new(storage.clone()),
            terminals: TerminalRegistry::new(storage.clone()),
            storage,
        }
    }

    pub fn staff(&self, username: &str, role: Role) -> Staff {
        self.staff
            .create(StaffCreate {
                username: username.into(),
                display_name: username.into(),
                role,
                password: None,
            })
            .unwrap()
    }

    pub fn terminal(&self, code: &str) -> Terminal {
        self.terminals.register(code).unwrap()
    }
}

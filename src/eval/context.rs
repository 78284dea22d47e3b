use crate::eval::CommandRegistry;
use crate::services::Services;
use crate::session::Session;

/// What a handler sees while it executes: the live session, the external
/// collaborators, and the registry it was dispatched from.
pub struct ExecContext<'a> {
    pub session: &'a mut Session,
    pub services: &'a Services,
    pub registry: &'a CommandRegistry,
}

impl<'a> ExecContext<'a> {
    pub fn new(
        session: &'a mut Session,
        services: &'a Services,
        registry: &'a CommandRegistry,
    ) -> Self {
        Self {
            session,
            services,
            registry,
        }
    }

    /// Session variables as one mapping, for collaborators that template
    /// against them (flows).
    pub fn variables(&self) -> serde_json::Value {
        self.session
            .list_variables()
            .map(|v| (v.name.clone(), v.value.clone()))
            .collect::<serde_json::Map<_, _>>()
            .into()
    }
}

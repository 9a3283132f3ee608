use super::Aggregate;

/// Group definitions, in declaration order. Registering has no side effect.
#[derive(Debug, Clone, Default)]
pub struct AggregateRegistry {
    aggregates: Vec<Aggregate>,
}

impl AggregateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a group. A later declaration with the same id replaces the earlier one.
    pub fn register(&mut self, aggregate: Aggregate) {
        let id = aggregate.id();
        match self.aggregates.iter_mut().find(|a| a.id() == id) {
            Some(existing) => *existing = aggregate,
            None => self.aggregates.push(aggregate),
        }
    }

    pub fn for_level<'a>(&'a self, level: &'a str) -> impl Iterator<Item = &'a Aggregate> + 'a {
        self.aggregates.iter().filter(move |a| a.level == level)
    }

    pub fn get(&self, id: &str) -> Option<&Aggregate> {
        self.aggregates.iter().find(|a| a.id() == id)
    }

    pub fn len(&self) -> usize {
        self.aggregates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aggregates.is_empty()
    }
}

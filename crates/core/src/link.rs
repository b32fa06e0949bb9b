use uuid::Uuid;

/// An endless supply of unique link names: `prefix-N` counting up from 1,
/// or random UUIDs when there is no prefix.
#[derive(Debug, Clone)]
pub struct LinkNames {
    prefix: Option<String>,
    next: u64,
}

impl LinkNames {
    pub fn new(prefix: Option<&str>) -> Self {
        LinkNames {
            prefix: prefix.filter(|p| !p.is_empty()).map(str::to_string),
            next: 1,
        }
    }
}

impl Iterator for LinkNames {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        match &self.prefix {
            Some(prefix) => {
                let name = format!("{}-{}", prefix, self.next);
                self.next += 1;
                Some(name)
            }
            None => Some(Uuid::new_v4().to_string()),
        }
    }
}

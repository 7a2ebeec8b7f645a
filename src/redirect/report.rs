use super::Unresolved;
use std::fmt;

/// What happened at a call site that has a substitute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Substituted,
    Unresolved(Unresolved),
}

/// One call site that matched a substitute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteEvent {
    /// Name and descriptor of the method containing the call site (eg. `run()V`)
    pub method: String,

    /// Source line of the call site, if the class has line numbers
    pub line: Option<u16>,

    /// Original call target (eg. `a/Db.query(I)I`)
    pub target: String,

    pub outcome: Outcome,
}

impl fmt::Display for SiteEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.method)?;
        if let Some(line) = self.line {
            write!(f, " (line {})", line)?;
        }
        match self.outcome {
            Outcome::Substituted => write!(f, ": substituted call to {}", self.target),
            Outcome::Unresolved(reason) => {
                write!(f, ": left call to {} untouched, {}", self.target, reason)
            }
        }
    }
}

/// Summary of the transformation of one class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformReport {
    pub class_name: String,

    /// The class already had the marker field, so nothing was done
    pub already_transformed: bool,

    /// Matched call sites, in the order they were visited
    pub events: Vec<SiteEvent>,
}

impl TransformReport {
    pub fn new(class_name: impl Into<String>) -> TransformReport {
        TransformReport {
            class_name: class_name.into(),
            already_transformed: false,
            events: vec![],
        }
    }

    pub fn substituted(&self) -> usize {
        self.events
            .iter()
            .filter(|event| event.outcome == Outcome::Substituted)
            .count()
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &SiteEvent> {
        self.events
            .iter()
            .filter(|event| matches!(event.outcome, Outcome::Unresolved(_)))
    }

    /// Were any method bodies changed?
    pub fn is_modified(&self) -> bool {
        self.substituted() > 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_events() {
        let mut report = TransformReport::new("a/Service");
        report.events.push(SiteEvent {
            method: String::from("run()V"),
            line: Some(12),
            target: String::from("a/Db.query(I)I"),
            outcome: Outcome::Substituted,
        });
        report.events.push(SiteEvent {
            method: String::from("stop()V"),
            line: None,
            target: String::from("a/Db.close()V"),
            outcome: Outcome::Unresolved(Unresolved::ExhaustedMethod { missing: 1 }),
        });

        assert_eq!(report.substituted(), 1);
        assert!(report.is_modified());
        assert_eq!(report.unresolved().count(), 1);
        assert_eq!(
            report.events[0].to_string(),
            "run()V (line 12): substituted call to a/Db.query(I)I"
        );
        assert_eq!(
            report.events[1].to_string(),
            "stop()V: left call to a/Db.close()V untouched, \
             reached start of method missing 1 operand slots"
        );
    }
}

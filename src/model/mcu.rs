use crate::model::node::{Aggregate, Component, ComponentKind, IdAllocator};
use crate::spec::QueueListSpec;

/// Micro-control unit owned by every cluster: fixed queue/interrupt/bin
/// leaves plus a data-driven list of event queues.
#[derive(Debug, Clone)]
pub struct Mcu {
    node: Component,
    irqa: Component,
    iqr: Component,
    iqd: Component,
    bin: Component,
    eqs: Vec<Component>,
}

impl Mcu {
    pub fn new(ids: &mut IdAllocator, spec: Option<&QueueListSpec>) -> Self {
        let node = Component::new(ids, ComponentKind::Mcu);
        let irqa = Component::new(ids, ComponentKind::Irqa);
        let iqr = Component::new(ids, ComponentKind::Iqr);
        let iqd = Component::new(ids, ComponentKind::Iqd);
        let bin = Component::new(ids, ComponentKind::Bin);
        let eqs = spec
            .map(|s| {
                s.eqs
                    .iter()
                    .map(|eq| Component::with_id(eq.id, ComponentKind::Eq))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            node,
            irqa,
            iqr,
            iqd,
            bin,
            eqs,
        }
    }

    pub fn node(&self) -> &Component {
        &self.node
    }

    pub fn node_mut(&mut self) -> &mut Component {
        &mut self.node
    }

    /// irqa, iqr, iqd, bin, then the event queues in document order.
    pub fn details(&self) -> Vec<&Component> {
        let mut out = vec![&self.irqa, &self.iqr, &self.iqd, &self.bin];
        out.extend(self.eqs.iter());
        out
    }

    pub fn details_mut(&mut self) -> Vec<&mut Component> {
        let mut out = vec![
            &mut self.irqa,
            &mut self.iqr,
            &mut self.iqd,
            &mut self.bin,
        ];
        out.extend(self.eqs.iter_mut());
        out
    }
}

impl Aggregate for Mcu {
    fn components(&self) -> Vec<&Component> {
        let mut out = self.details();
        out.push(&self.node);
        out
    }

    fn components_mut(&mut self) -> Vec<&mut Component> {
        let mut out = vec![
            &mut self.irqa,
            &mut self.iqr,
            &mut self.iqd,
            &mut self.bin,
        ];
        out.extend(self.eqs.iter_mut());
        out.push(&mut self.node);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::chip::EqSpec;
    use pretty_assertions::assert_eq;

    fn eqs(details: Vec<&Component>) -> Vec<&Component> {
        details
            .into_iter()
            .filter(|c| c.kind() == ComponentKind::Eq)
            .collect()
    }

    #[test]
    fn details_list_fixed_leaves_then_queues() {
        let mut ids = IdAllocator::new();
        let spec = QueueListSpec {
            eqs: vec![EqSpec { id: 40 }, EqSpec { id: 41 }],
        };
        let mcu = Mcu::new(&mut ids, Some(&spec));

        let tags: Vec<&str> = mcu.details().iter().map(|c| c.type_name()).collect();
        assert_eq!(tags, vec!["irqa", "iqr", "iqd", "bin", "eq", "eq"]);
        let eq_ids: Vec<u64> = eqs(mcu.details()).iter().map(|c| c.id()).collect();
        assert_eq!(eq_ids, vec![40, 41]);

        // Own node comes last in the recursive view.
        let all = mcu.components();
        assert_eq!(all.len(), 7);
        assert_eq!(all[6].kind(), ComponentKind::Mcu);
    }

    #[test]
    fn absent_section_means_no_queues() {
        let mut ids = IdAllocator::new();
        let mcu = Mcu::new(&mut ids, None);
        assert!(eqs(mcu.details()).is_empty());
        assert_eq!(mcu.details().len(), 4);
    }
}

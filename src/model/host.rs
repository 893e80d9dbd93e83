//! Host interface subtree: bmt and pcie leaves, plus the H2G and G2H
//! transport composites. Independent of die/quad/cluster addressing.

use crate::model::node::{Aggregate, Component, ComponentKind, IdAllocator};
use crate::spec::HostInterfaceSpec;

#[derive(Debug, Clone)]
pub struct H2g {
    node: Component,
    cbus_inj: Component,
    cbus_clt: Component,
    nfi_inj: Component,
    nfi_clt: Component,
    irqa: Component,
}

impl H2g {
    fn new(ids: &mut IdAllocator) -> Self {
        Self {
            node: Component::new(ids, ComponentKind::H2g),
            cbus_inj: Component::new(ids, ComponentKind::CbusInj),
            cbus_clt: Component::new(ids, ComponentKind::CbusClt),
            nfi_inj: Component::new(ids, ComponentKind::NfiInj),
            nfi_clt: Component::new(ids, ComponentKind::NfiClt),
            irqa: Component::new(ids, ComponentKind::Irqa),
        }
    }

    pub fn node(&self) -> &Component {
        &self.node
    }

    pub fn details(&self) -> Vec<&Component> {
        vec![
            &self.cbus_inj,
            &self.cbus_clt,
            &self.nfi_inj,
            &self.nfi_clt,
            &self.irqa,
        ]
    }

    fn details_mut(&mut self) -> Vec<&mut Component> {
        vec![
            &mut self.cbus_inj,
            &mut self.cbus_clt,
            &mut self.nfi_inj,
            &mut self.nfi_clt,
            &mut self.irqa,
        ]
    }
}

impl Aggregate for H2g {
    fn components(&self) -> Vec<&Component> {
        let mut out = self.details();
        out.push(&self.node);
        out
    }

    fn components_mut(&mut self) -> Vec<&mut Component> {
        let mut out = vec![
            &mut self.cbus_inj,
            &mut self.cbus_clt,
            &mut self.nfi_inj,
            &mut self.nfi_clt,
            &mut self.irqa,
        ];
        out.push(&mut self.node);
        out
    }
}

#[derive(Debug, Clone)]
pub struct G2h {
    node: Component,
    irqa: Component,
    eqs: Vec<Component>,
}

impl G2h {
    fn new(ids: &mut IdAllocator, spec: &HostInterfaceSpec) -> Self {
        let node = Component::new(ids, ComponentKind::G2h);
        let irqa = Component::new(ids, ComponentKind::Irqa);
        let eqs = spec
            .g2h
            .as_ref()
            .map(|list| {
                list.eqs
                    .iter()
                    .map(|eq| Component::with_id(eq.id, ComponentKind::Eq))
                    .collect()
            })
            .unwrap_or_default();
        Self { node, irqa, eqs }
    }

    pub fn node(&self) -> &Component {
        &self.node
    }

    /// irqa, then event queues in document order.
    pub fn details(&self) -> Vec<&Component> {
        let mut out = vec![&self.irqa];
        out.extend(self.eqs.iter());
        out
    }

    fn details_mut(&mut self) -> Vec<&mut Component> {
        let mut out = vec![&mut self.irqa];
        out.extend(self.eqs.iter_mut());
        out
    }
}

impl Aggregate for G2h {
    fn components(&self) -> Vec<&Component> {
        let mut out = self.details();
        out.push(&self.node);
        out
    }

    fn components_mut(&mut self) -> Vec<&mut Component> {
        let G2h { node, irqa, eqs } = self;
        let mut out = vec![irqa];
        out.extend(eqs.iter_mut());
        out.push(node);
        out
    }
}

#[derive(Debug, Clone)]
pub struct HostInterface {
    node: Component,
    bmt: Component,
    h2g: H2g,
    g2h: G2h,
    pcie: Component,
}

impl HostInterface {
    pub fn new(ids: &mut IdAllocator, spec: &HostInterfaceSpec) -> Self {
        let node = Component::new(ids, ComponentKind::HostInterface);
        let bmt = Component::new(ids, ComponentKind::Bmt);
        let h2g = H2g::new(ids);
        let g2h = G2h::new(ids, spec);
        let pcie = Component::new(ids, ComponentKind::Pcie);
        Self {
            node,
            bmt,
            h2g,
            g2h,
            pcie,
        }
    }

    pub fn node(&self) -> &Component {
        &self.node
    }

    pub fn bmt_mut(&mut self) -> &mut Component {
        &mut self.bmt
    }

    pub fn pcie_mut(&mut self) -> &mut Component {
        &mut self.pcie
    }

    pub fn h2g(&self) -> &H2g {
        &self.h2g
    }

    pub fn g2h(&self) -> &G2h {
        &self.g2h
    }

    /// bmt, H2G, G2H, pcie.
    pub fn details(&self) -> Vec<&Component> {
        vec![&self.bmt, self.h2g.node(), self.g2h.node(), &self.pcie]
    }

    /// bmt, pcie, H2G leaves, G2H leaves. Composite nodes are not listed.
    pub fn all_inner_details(&self) -> Vec<&Component> {
        let mut out = vec![&self.bmt, &self.pcie];
        out.extend(self.h2g.details());
        out.extend(self.g2h.details());
        out
    }

    pub fn all_inner_details_mut(&mut self) -> Vec<&mut Component> {
        let HostInterface {
            bmt, h2g, g2h, pcie, ..
        } = self;
        let mut out = vec![bmt, pcie];
        out.extend(h2g.details_mut());
        out.extend(g2h.details_mut());
        out
    }
}

impl Aggregate for HostInterface {
    fn components(&self) -> Vec<&Component> {
        let mut out = vec![&self.bmt];
        out.extend(self.h2g.components());
        out.extend(self.g2h.components());
        out.push(&self.pcie);
        out.push(&self.node);
        out
    }

    fn components_mut(&mut self) -> Vec<&mut Component> {
        let HostInterface {
            node,
            bmt,
            h2g,
            g2h,
            pcie,
        } = self;
        let mut out = vec![bmt];
        out.extend(h2g.components_mut());
        out.extend(g2h.components_mut());
        out.push(pcie);
        out.push(node);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn eqs(details: Vec<&Component>) -> Vec<&Component> {
        details
            .into_iter()
            .filter(|c| c.kind() == ComponentKind::Eq)
            .collect()
    }

    fn host(value: serde_json::Value) -> HostInterface {
        let spec: HostInterfaceSpec = serde_json::from_value(value).unwrap();
        HostInterface::new(&mut IdAllocator::new(), &spec)
    }

    #[test]
    fn detail_views_have_fixed_order() {
        let hi = host(json!({"G2H": {"EQs": [{"id": 100}, {"id": 101}]}}));

        let details: Vec<&str> = hi.details().iter().map(|c| c.type_name()).collect();
        assert_eq!(details, vec!["bmt", "H2G", "G2H", "pcie"]);

        let inner: Vec<&str> = hi.all_inner_details().iter().map(|c| c.type_name()).collect();
        assert_eq!(
            inner,
            vec![
                "bmt", "pcie", "cbus inj", "cbus clt", "nfi inj", "nfi clt", "irqa", "irqa", "eq",
                "eq"
            ]
        );
        let eq_ids: Vec<u64> = eqs(hi.g2h().details()).iter().map(|c| c.id()).collect();
        assert_eq!(eq_ids, vec![100, 101]);
    }

    #[test]
    fn missing_g2h_list_is_empty() {
        let hi = host(json!({"name": "hi"}));
        assert!(eqs(hi.g2h().details()).is_empty());
        // bmt, 6 H2G nodes, 2 G2H nodes, pcie, own node.
        assert_eq!(hi.components().len(), 11);
    }

    #[test]
    fn mutable_inner_view_matches_shared_view() {
        let mut hi = host(json!({"G2H": {"EQs": [{"id": 7}]}}));
        let shared: Vec<u64> = hi.all_inner_details().iter().map(|c| c.id()).collect();
        let owned: Vec<u64> = hi.all_inner_details_mut().iter().map(|c| c.id()).collect();
        assert_eq!(shared, owned);
    }
}

//! Reconstruction of the order/observation hierarchy from a flat segment stream.
//!
//! Both groupers make a single forward pass. Notes bind to the nearest preceding observation
//! of the current group, or to the group itself when no observation is open.

use crate::segment::{Segment, SegmentKind};

/// The one order-detail segment of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDetail<'a> {
    Lab(&'a Segment),
    Pharmacy(&'a Segment),
    Immunization(&'a Segment),
    Unknown,
}

impl<'a> OrderDetail<'a> {
    fn from_segment(segment: &'a Segment) -> Option<Self> {
        match segment.kind() {
            SegmentKind::Obr => Some(OrderDetail::Lab(segment)),
            SegmentKind::Rxo => Some(OrderDetail::Pharmacy(segment)),
            SegmentKind::Rxa => Some(OrderDetail::Immunization(segment)),
            _ => None,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, OrderDetail::Unknown)
    }
}

/// An OBX with the NTE segments that follow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationGroup<'a> {
    pub observation: &'a Segment,
    pub notes: Vec<&'a Segment>,
}

impl<'a> ObservationGroup<'a> {
    fn new(observation: &'a Segment) -> Self {
        Self {
            observation,
            notes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderGroup<'a> {
    pub order: &'a Segment,
    pub detail: OrderDetail<'a>,
    pub notes: Vec<&'a Segment>,
    pub diagnoses: Vec<&'a Segment>,
    pub observations: Vec<ObservationGroup<'a>>,
}

impl<'a> OrderGroup<'a> {
    fn new(order: &'a Segment) -> Self {
        Self {
            order,
            detail: OrderDetail::Unknown,
            notes: Vec::new(),
            diagnoses: Vec::new(),
            observations: Vec::new(),
        }
    }
}

/// Incremental ORC-led grouping (ORM, OML, VXU).
#[derive(Debug, Default)]
pub struct OrderGrouper<'a> {
    groups: Vec<OrderGroup<'a>>,
    current_observation: Option<ObservationGroup<'a>>,
}

impl<'a> OrderGrouper<'a> {
    pub fn new() -> Self {
        Self {
            groups: Vec::new(),
            current_observation: None,
        }
    }

    pub fn push(&mut self, segment: &'a Segment) {
        let kind = segment.kind();
        if kind == SegmentKind::Orc {
            self.flush_observation();
            self.groups.push(OrderGroup::new(segment));
            return;
        }

        if self.groups.is_empty() {
            return;
        }

        match kind {
            SegmentKind::Obr | SegmentKind::Rxo | SegmentKind::Rxa => {
                let Some(group) = self.groups.last_mut() else {
                    return;
                };
                if group.detail.is_known() {
                    tracing::debug!(
                        "Ignoring repeated order detail {} in order group",
                        segment.tag()
                    );
                } else if let Some(detail) = OrderDetail::from_segment(segment) {
                    group.detail = detail;
                }
            }
            SegmentKind::Nte => match self.current_observation.as_mut() {
                Some(observation) => observation.notes.push(segment),
                None => {
                    if let Some(group) = self.groups.last_mut() {
                        group.notes.push(segment);
                    }
                }
            },
            SegmentKind::Dg1 => {
                if let Some(group) = self.groups.last_mut() {
                    group.diagnoses.push(segment);
                }
            }
            SegmentKind::Obx => {
                self.flush_observation();
                self.current_observation = Some(ObservationGroup::new(segment));
            }
            _ => {}
        }
    }

    fn flush_observation(&mut self) {
        if let Some(observation) = self.current_observation.take() {
            if let Some(group) = self.groups.last_mut() {
                group.observations.push(observation);
            }
        }
    }

    pub fn finish(mut self) -> Vec<OrderGroup<'a>> {
        self.flush_observation();
        self.groups
    }
}

/// Group a segment stream into ORC-led order groups.
pub fn group_orders<'a, I>(segments: I) -> Vec<OrderGroup<'a>>
where
    I: IntoIterator<Item = &'a Segment>,
{
    let mut grouper = OrderGrouper::new();
    for segment in segments {
        grouper.push(segment);
    }
    grouper.finish()
}

/// An OBR-led result group (ORU), with the ORC that preceded it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultGroup<'a> {
    pub order: Option<&'a Segment>,
    pub request: &'a Segment,
    pub notes: Vec<&'a Segment>,
    pub observations: Vec<ObservationGroup<'a>>,
}

/// Group an ORU segment stream: an ORC is held for the next OBR, each OBR opens a group,
/// and segments before the first OBR are ignored.
pub fn group_results<'a, I>(segments: I) -> Vec<ResultGroup<'a>>
where
    I: IntoIterator<Item = &'a Segment>,
{
    let mut groups: Vec<ResultGroup<'a>> = Vec::new();
    let mut open = false;
    let mut pending_order: Option<&'a Segment> = None;
    let mut current_observation: Option<ObservationGroup<'a>> = None;

    let flush = |groups: &mut Vec<ResultGroup<'a>>, obs: &mut Option<ObservationGroup<'a>>| {
        if let (Some(observation), Some(group)) = (obs.take(), groups.last_mut()) {
            group.observations.push(observation);
        }
    };

    for segment in segments {
        match segment.kind() {
            SegmentKind::Orc => {
                flush(&mut groups, &mut current_observation);
                open = false;
                pending_order = Some(segment);
            }
            SegmentKind::Obr => {
                flush(&mut groups, &mut current_observation);
                groups.push(ResultGroup {
                    order: pending_order.take(),
                    request: segment,
                    notes: Vec::new(),
                    observations: Vec::new(),
                });
                open = true;
            }
            SegmentKind::Nte if open => match current_observation.as_mut() {
                Some(observation) => observation.notes.push(segment),
                None => {
                    if let Some(group) = groups.last_mut() {
                        group.notes.push(segment);
                    }
                }
            },
            SegmentKind::Obx if open => {
                flush(&mut groups, &mut current_observation);
                current_observation = Some(ObservationGroup::new(segment));
            }
            _ => {}
        }
    }
    flush(&mut groups, &mut current_observation);

    groups
}

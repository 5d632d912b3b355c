use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};

use super::header::MessageHeader;
use super::lookup::EncounterLookup;
use super::result::ConversionResult;
use crate::converter::{
    RequestLinks, SubjectRefs, condition_id, convert_condition, convert_coverage,
    convert_diagnostic_report, convert_encounter, convert_immunization,
    convert_medication_request, convert_observation, convert_patient, convert_service_request,
    coverage_id, encounter_id, has_encounter, immunization_id, is_deleted, observation_ids,
    order_control_fallback, order_id, patient_id,
};
use crate::core::{ConverterConfig, MessageType, ObservationRole, SenderContext};
use crate::error::{ConversionError, Result};
use crate::grouping::{
    ObservationGroup, OrderDetail, OrderGroup, ResultGroup, group_orders, group_results,
};
use crate::identity::select_diagnoses;
use crate::segment::{Message, Segment, SegmentKind, decode_messages};
use crate::terminology::{
    CodeResolver, ConceptMapSource, InMemoryConceptMapSource, LocalCode, MappingError,
    MappingErrors, ResolutionContext,
};
use crate::types::{Bundle, Condition, Encounter, Observation, Reference, Resource};

/// Converts decoded HL7v2 messages into FHIR transaction bundles.
///
/// One message goes through header → patient → encounter → groups → bundle. Order groups are
/// converted concurrently up to `max_concurrent_groups`, and their output is kept in input
/// order. A single unresolved code anywhere in the message turns the whole result into an
/// error carrying every mapping error that was found; no partial bundle is returned.
pub struct Hl7v2Converter {
    config: ConverterConfig,
    resolver: CodeResolver,
    encounter_lookup: Option<Arc<dyn EncounterLookup>>,
}

impl std::fmt::Debug for Hl7v2Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hl7v2Converter")
            .field("config", &self.config)
            .field("resolver", &self.resolver)
            .field("encounter_lookup", &self.encounter_lookup.is_some())
            .finish()
    }
}

/// Per-message values every group needs.
struct MessageContext {
    sender: SenderContext,
    patient_id: String,
    subject: SubjectRefs,
    condition_scope: String,
}

/// What one group contributes: resources, or only the mapping errors that sank it.
#[derive(Debug, Default)]
struct GroupOutput {
    resources: Vec<Resource>,
    mapping_errors: Vec<MappingError>,
}

impl GroupOutput {
    fn finish(resources: Vec<Resource>, errors: MappingErrors) -> Self {
        if errors.is_empty() {
            Self {
                resources,
                mapping_errors: Vec::new(),
            }
        } else {
            Self {
                resources: Vec::new(),
                mapping_errors: errors.into_vec(),
            }
        }
    }
}

impl Hl7v2Converter {
    pub fn new(config: ConverterConfig, source: Arc<dyn ConceptMapSource>) -> Self {
        let resolver = CodeResolver::new(source, config.mapping_id_prefix.clone());
        Self {
            config,
            resolver,
            encounter_lookup: None,
        }
    }

    /// Build a converter whose mapping source follows `config.terminology`: an HTTP store when
    /// a base URL is configured, otherwise an empty in-memory source (static tables only).
    pub fn from_config(config: ConverterConfig) -> Result<Self> {
        config.validate()?;
        let source = concept_map_source(&config)?;
        Ok(Self::new(config, source))
    }

    pub fn with_encounter_lookup(mut self, lookup: Arc<dyn EncounterLookup>) -> Self {
        self.encounter_lookup = Some(lookup);
        self
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    pub fn resolver(&self) -> &CodeResolver {
        &self.resolver
    }

    /// Convert one message. Never fails: structural problems become an error result.
    pub async fn convert(&self, message: &Message) -> ConversionResult {
        let started = Instant::now();
        match self.try_convert(message).await {
            Ok(result) => {
                tracing::debug!(
                    "Message converted with status {} in {:?}",
                    result.status(),
                    started.elapsed()
                );
                result
            }
            Err(error) => {
                tracing::warn!("Message conversion failed: {}", error);
                ConversionResult::from_error(&error)
            }
        }
    }

    /// Decode raw text (one or more messages) and convert each message in order.
    pub async fn convert_text(&self, text: &str) -> Vec<ConversionResult> {
        let messages = match decode_messages(text) {
            Ok(messages) => messages,
            Err(error) => {
                tracing::warn!("Failed to decode input: {}", error);
                return vec![ConversionResult::from_error(&error)];
            }
        };

        let mut results = Vec::with_capacity(messages.len());
        for message in &messages {
            results.push(self.convert(message).await);
        }
        results
    }

    async fn try_convert(&self, message: &Message) -> Result<ConversionResult> {
        let msh = message
            .first(SegmentKind::Msh)
            .ok_or(ConversionError::MissingSegment { segment: "MSH" })?;
        let header = MessageHeader::from_msh(msh)?;

        let pid = message
            .first(SegmentKind::Pid)
            .ok_or(ConversionError::MissingSegment { segment: "PID" })?;
        let patient_id = patient_id(pid).map_err(|e| ConversionError::identity("Patient", e))?;
        let patient_ref = Reference::to("Patient", &patient_id);
        let patient = convert_patient(pid, patient_id.clone());

        let mut errors = MappingErrors::new();
        let mut warnings = Vec::new();

        let encounter = self
            .resolve_encounter(
                message,
                &patient_id,
                &patient_ref,
                &header.sender,
                &mut errors,
                &mut warnings,
            )
            .await;

        let ctx = MessageContext {
            sender: header.sender.clone(),
            patient_id: patient_id.clone(),
            subject: SubjectRefs::new(
                patient_ref.clone(),
                encounter.as_ref().map(|e| Reference::to("Encounter", &e.id)),
            ),
            condition_scope: encounter
                .as_ref()
                .map(|e| e.id.clone())
                .unwrap_or_else(|| patient_id.clone()),
        };

        let segments = message.segments();
        let body_start = segments
            .iter()
            .position(|s| opens_group(header.message_type, s))
            .unwrap_or(segments.len());
        let (preamble, body) = segments.split_at(body_start);

        let coverages: Vec<Resource> = preamble
            .iter()
            .filter(|s| s.kind() == SegmentKind::In1)
            .filter_map(|in1| {
                let id = coverage_id(in1, &patient_id)?;
                Some(Resource::Coverage(convert_coverage(in1, id, &patient_ref)))
            })
            .collect();

        let diagnoses: Vec<&Segment> = preamble
            .iter()
            .filter(|s| s.kind() == SegmentKind::Dg1)
            .collect();
        let conditions = convert_conditions(&diagnoses, &ctx);

        let groups = match header.message_type {
            MessageType::Adt => Vec::new(),
            MessageType::Oru => self.convert_result_groups(body, &ctx).await?,
            MessageType::Orm | MessageType::Oml | MessageType::Vxu => {
                self.convert_order_groups(body, &ctx).await?
            }
        };

        let mut group_resources = Vec::new();
        for group in groups {
            errors.extend(group.mapping_errors);
            group_resources.extend(group.resources);
        }

        if !errors.is_empty() {
            tracing::info!(
                "{} message {} has {} unmapped code(s)",
                header.message_type,
                header.control_id.as_deref().unwrap_or("-"),
                errors.len()
            );
            return Ok(ConversionResult::from_mapping_errors(errors.into_vec()));
        }

        if header.message_type.carries_orders() && group_resources.is_empty() && conditions.is_empty()
        {
            return Err(ConversionError::NoProcessableContent);
        }

        let resources = std::iter::once(Resource::Patient(patient))
            .chain(encounter.map(Resource::Encounter))
            .chain(coverages)
            .chain(conditions.into_iter().map(Resource::Condition))
            .chain(group_resources);
        let bundle = assemble_bundle(resources, &mut warnings);

        tracing::info!(
            "Converted {} message {} into {} resources",
            header.message_type,
            header.control_id.as_deref().unwrap_or("-"),
            bundle.len()
        );

        Ok(if warnings.is_empty() {
            ConversionResult::Processed {
                bundle,
                patient_ref,
            }
        } else {
            ConversionResult::Warning {
                bundle,
                patient_ref,
                warning_message: warnings.join("; "),
            }
        })
    }

    async fn resolve_encounter(
        &self,
        message: &Message,
        patient_id: &str,
        patient_ref: &Reference,
        sender: &SenderContext,
        errors: &mut MappingErrors,
        warnings: &mut Vec<String>,
    ) -> Option<Encounter> {
        let pv1 = message
            .first(SegmentKind::Pv1)
            .filter(|pv1| has_encounter(pv1))?;

        let Some(mut id) = encounter_id(pv1, patient_id) else {
            tracing::warn!("PV1 has neither a visit number nor an admit time; encounter omitted");
            warnings.push(
                "Encounter omitted: PV1 has neither a visit number (PV1-19) nor an admit time (PV1-44)"
                    .to_string(),
            );
            return None;
        };

        if let Some(lookup) = &self.encounter_lookup {
            let existing = lookup.find_encounters(patient_id, pv1.opt_value(19)).await;
            match existing.as_slice() {
                [] => {}
                [found] => id = found.clone(),
                several => {
                    tracing::warn!(
                        "{} stored encounters match visit {}",
                        several.len(),
                        pv1.value(19)
                    );
                    warnings.push(format!(
                        "{} existing encounters match visit {}; using {}",
                        several.len(),
                        pv1.value(19),
                        id
                    ));
                }
            }
        }

        let class = match pv1.opt_value(2) {
            Some(code) => errors.take(
                self.resolver
                    .resolve(
                        LocalCode::new(code),
                        &ResolutionContext::patient_class(),
                        sender,
                    )
                    .await,
            ),
            None => None,
        };

        Some(convert_encounter(pv1, id, class, patient_ref))
    }

    async fn convert_order_groups(
        &self,
        segments: &[Segment],
        ctx: &MessageContext,
    ) -> Result<Vec<GroupOutput>> {
        let groups = group_orders(segments);
        tracing::debug!("Reconstructed {} order group(s)", groups.len());

        let outputs: Vec<Result<GroupOutput>> = stream::iter(groups.iter())
            .map(|group| self.convert_order_group(group, ctx))
            .buffered(self.config.max_concurrent_groups.max(1))
            .collect()
            .await;
        outputs.into_iter().collect()
    }

    async fn convert_result_groups(
        &self,
        segments: &[Segment],
        ctx: &MessageContext,
    ) -> Result<Vec<GroupOutput>> {
        let groups = group_results(segments);
        tracing::debug!("Reconstructed {} result group(s)", groups.len());

        let outputs: Vec<Result<GroupOutput>> = stream::iter(groups.iter())
            .map(|group| self.convert_result_group(group, ctx))
            .buffered(self.config.max_concurrent_groups.max(1))
            .collect()
            .await;
        outputs.into_iter().collect()
    }

    async fn convert_order_group(
        &self,
        group: &OrderGroup<'_>,
        ctx: &MessageContext,
    ) -> Result<GroupOutput> {
        let orc = group.order;
        let mut errors = MappingErrors::new();

        let resources = match group.detail {
            OrderDetail::Unknown => {
                tracing::debug!(
                    "Skipping order group {} without order detail",
                    orc.value(2)
                );
                return Ok(GroupOutput::default());
            }
            OrderDetail::Lab(obr) => {
                let id = order_id(Some(orc), Some(obr))
                    .map_err(|e| ConversionError::identity("ServiceRequest", e))?;
                let conditions = convert_conditions(&group.diagnoses, ctx);
                let status = self
                    .order_status(
                        orc,
                        &ResolutionContext::order_status(),
                        &ctx.sender,
                        &mut errors,
                    )
                    .await;
                let observations = self
                    .convert_observations(
                        &group.observations,
                        &id,
                        ObservationRole::OrderEntry,
                        ctx,
                        &mut errors,
                    )
                    .await;

                let request_ref = Reference::to("ServiceRequest", &id);
                let links = RequestLinks {
                    subject: &ctx.subject,
                    reasons: condition_refs(&conditions),
                    notes: &group.notes,
                };
                let request =
                    convert_service_request(orc, obr, id, status.unwrap_or_default(), &links);

                assemble_group(
                    conditions,
                    Resource::ServiceRequest(request),
                    observations,
                    |observation| observation.based_on.push(request_ref.clone()),
                )
            }
            OrderDetail::Pharmacy(rxo) => {
                let id = order_id(Some(orc), None)
                    .map_err(|e| ConversionError::identity("MedicationRequest", e))?;
                let conditions = convert_conditions(&group.diagnoses, ctx);
                let status = self
                    .order_status(
                        orc,
                        &ResolutionContext::medication_order_status(),
                        &ctx.sender,
                        &mut errors,
                    )
                    .await;
                let observations = self
                    .convert_observations(
                        &group.observations,
                        &id,
                        ObservationRole::OrderEntry,
                        ctx,
                        &mut errors,
                    )
                    .await;

                let request_ref = Reference::to("MedicationRequest", &id);
                let links = RequestLinks {
                    subject: &ctx.subject,
                    reasons: condition_refs(&conditions),
                    notes: &group.notes,
                };
                let request = convert_medication_request(
                    orc,
                    rxo,
                    id,
                    status.as_deref().unwrap_or_default(),
                    &links,
                );

                assemble_group(
                    conditions,
                    Resource::MedicationRequest(request),
                    observations,
                    |observation| observation.based_on.push(request_ref.clone()),
                )
            }
            OrderDetail::Immunization(rxa) => {
                let id = immunization_id(orc, rxa, &ctx.patient_id);
                let conditions = convert_conditions(&group.diagnoses, ctx);
                let status = if is_deleted(rxa) {
                    Some("entered-in-error".to_string())
                } else {
                    errors.take(
                        self.resolver
                            .resolve(
                                LocalCode::new(rxa.value(20)),
                                &ResolutionContext::immunization_status(),
                                &ctx.sender,
                            )
                            .await,
                    )
                };
                let observations = self
                    .convert_observations(
                        &group.observations,
                        &id,
                        ObservationRole::FinalResult,
                        ctx,
                        &mut errors,
                    )
                    .await;

                let immunization_ref = Reference::to("Immunization", &id);
                let immunization =
                    convert_immunization(rxa, id, status.unwrap_or_default(), &ctx.subject);

                assemble_group(
                    conditions,
                    Resource::Immunization(immunization),
                    observations,
                    |observation| observation.part_of.push(immunization_ref.clone()),
                )
            }
        };

        Ok(GroupOutput::finish(resources, errors))
    }

    async fn convert_result_group(
        &self,
        group: &ResultGroup<'_>,
        ctx: &MessageContext,
    ) -> Result<GroupOutput> {
        let obr = group.request;
        let mut errors = MappingErrors::new();

        let id = order_id(group.order, Some(obr))
            .map_err(|e| ConversionError::identity("DiagnosticReport", e))?;
        let status = errors.take(
            self.resolver
                .resolve(
                    LocalCode::new(obr.value(25)),
                    &ResolutionContext::diagnostic_report_status(),
                    &ctx.sender,
                )
                .await,
        );
        let observations = self
            .convert_observations(
                &group.observations,
                &id,
                ObservationRole::FinalResult,
                ctx,
                &mut errors,
            )
            .await;

        let results = observations
            .iter()
            .map(|o| Reference::to("Observation", &o.id))
            .collect();
        let report = convert_diagnostic_report(
            obr,
            id,
            status.unwrap_or_default(),
            &ctx.subject,
            &group.notes,
            results,
        );

        let resources = assemble_group(
            Vec::new(),
            Resource::DiagnosticReport(report),
            observations,
            |_| {},
        );
        Ok(GroupOutput::finish(resources, errors))
    }

    /// ORC-5 through the resolver; an empty ORC-5 falls back to the ORC-1 order control.
    async fn order_status(
        &self,
        orc: &Segment,
        context: &ResolutionContext,
        sender: &SenderContext,
        errors: &mut MappingErrors,
    ) -> Option<String> {
        match orc.opt_value(5) {
            Some(code) => errors.take(
                self.resolver
                    .resolve(LocalCode::new(code), context, sender)
                    .await,
            ),
            None => Some(order_control_fallback(orc)),
        }
    }

    async fn convert_observations(
        &self,
        observations: &[ObservationGroup<'_>],
        order_id: &str,
        role: ObservationRole,
        ctx: &MessageContext,
        errors: &mut MappingErrors,
    ) -> Vec<Observation> {
        let context = ResolutionContext::observation_status(role);
        let segments: Vec<&Segment> = observations.iter().map(|o| o.observation).collect();
        let ids = observation_ids(order_id, &segments);
        let mut converted = Vec::with_capacity(observations.len());

        for (group, id) in observations.iter().zip(ids) {
            let obx = group.observation;
            let status = errors.take(
                self.resolver
                    .resolve(LocalCode::new(obx.value(11)), &context, &ctx.sender)
                    .await,
            );
            converted.push(convert_observation(
                obx,
                id,
                status.unwrap_or_default(),
                &ctx.subject,
                &group.notes,
            ));
        }

        converted
    }
}

#[cfg(feature = "http-source")]
fn concept_map_source(config: &ConverterConfig) -> Result<Arc<dyn ConceptMapSource>> {
    match crate::terminology::HttpConceptMapSource::from_config(&config.terminology)? {
        Some(http) => {
            tracing::info!(
                "Using terminology store at {}",
                config.terminology.base_url.as_deref().unwrap_or_default()
            );
            Ok(Arc::new(http))
        }
        None => Ok(Arc::new(InMemoryConceptMapSource::new())),
    }
}

#[cfg(not(feature = "http-source"))]
fn concept_map_source(config: &ConverterConfig) -> Result<Arc<dyn ConceptMapSource>> {
    if config.terminology.base_url.is_some() {
        tracing::warn!("Terminology base URL ignored: built without the http-source feature");
    }
    Ok(Arc::new(InMemoryConceptMapSource::new()))
}

/// Whether `segment` starts the order/result part of a message of this type.
fn opens_group(message_type: MessageType, segment: &Segment) -> bool {
    match message_type {
        MessageType::Adt => false,
        MessageType::Oru => matches!(segment.kind(), SegmentKind::Orc | SegmentKind::Obr),
        MessageType::Orm | MessageType::Oml | MessageType::Vxu => {
            segment.kind() == SegmentKind::Orc
        }
    }
}

fn convert_conditions(diagnoses: &[&Segment], ctx: &MessageContext) -> Vec<Condition> {
    select_diagnoses(diagnoses)
        .into_iter()
        .map(|dg1| {
            let id = condition_id(dg1, &ctx.condition_scope);
            convert_condition(dg1, id, &ctx.subject)
        })
        .collect()
}

fn condition_refs(conditions: &[Condition]) -> Vec<Reference> {
    conditions
        .iter()
        .map(|c| Reference::to("Condition", &c.id))
        .collect()
}

/// Group conditions, then the primary resource, then its observations.
fn assemble_group(
    conditions: Vec<Condition>,
    primary: Resource,
    observations: Vec<Observation>,
    link: impl Fn(&mut Observation),
) -> Vec<Resource> {
    let mut resources: Vec<Resource> = conditions.into_iter().map(Resource::Condition).collect();
    resources.push(primary);
    resources.extend(observations.into_iter().map(|mut observation| {
        link(&mut observation);
        Resource::Observation(observation)
    }));
    resources
}

/// Conditions and Coverages are keyed by their content, so a repeat is the same record.
fn is_shared(resource: &Resource) -> bool {
    matches!(resource, Resource::Condition(_) | Resource::Coverage(_))
}

/// Entries in order. A repeated `(type, id)` keeps the first entry; for anything other than
/// shared content the drop is reported as a warning.
fn assemble_bundle(
    resources: impl IntoIterator<Item = Resource>,
    warnings: &mut Vec<String>,
) -> Bundle {
    let mut bundle = Bundle::transaction();
    let mut seen = HashSet::new();
    for resource in resources {
        if seen.insert((resource.resource_type(), resource.id().to_string())) {
            bundle.push(resource);
        } else if is_shared(&resource) {
            tracing::debug!(
                "Dropping repeated {}/{}",
                resource.resource_type(),
                resource.id()
            );
        } else {
            tracing::warn!(
                "Two {} resources share id {}; keeping the first",
                resource.resource_type(),
                resource.id()
            );
            warnings.push(format!(
                "Duplicate {}/{} dropped: another resource in the message has the same id",
                resource.resource_type(),
                resource.id()
            ));
        }
    }
    bundle
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(id: &str) -> Resource {
        Resource::Observation(Observation {
            id: id.to_string(),
            status: "final".to_string(),
            ..Default::default()
        })
    }

    fn condition(id: &str) -> Resource {
        Resource::Condition(Condition {
            id: id.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_repeated_shared_content_is_merged_quietly() {
        let mut warnings = Vec::new();
        let bundle = assemble_bundle(
            [condition("c1"), observation("o1"), condition("c1")],
            &mut warnings,
        );

        assert_eq!(bundle.len(), 2);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_colliding_results_are_reported() {
        let mut warnings = Vec::new();
        let bundle = assemble_bundle(
            [observation("o1"), observation("o2"), observation("o1")],
            &mut warnings,
        );

        assert_eq!(bundle.len(), 2);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Observation/o1"));
    }
}

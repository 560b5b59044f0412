//! Mastery gate evaluation and curriculum path states.
//!
//! A module is complete only when every requirement of its gate is met.
//! Requirements are computed on demand from [`ModuleProgress`] and never
//! stored.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{Curriculum, ModuleDefinition, ModuleProgress, Track};

/// Concept-check score required when a module does not set its own.
pub const DEFAULT_CONCEPT_CHECK_MIN: u32 = 75;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequirementKind {
    Lessons,
    Labs,
    ConceptCheck,
    Project,
}

impl RequirementKind {
    /// The progress counter this requirement compares against.
    fn current(&self, progress: &ModuleProgress) -> u32 {
        match self {
            RequirementKind::Lessons => progress.lessons_completed,
            RequirementKind::Labs => progress.labs_completed,
            RequirementKind::ConceptCheck => progress.concept_check_score.unwrap_or(0),
            RequirementKind::Project => u32::from(progress.project_submitted),
        }
    }
}

impl fmt::Display for RequirementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequirementKind::Lessons => write!(f, "lessons"),
            RequirementKind::Labs => write!(f, "labs"),
            RequirementKind::ConceptCheck => write!(f, "concept check"),
            RequirementKind::Project => write!(f, "project"),
        }
    }
}

/// One requirement of a gate, before it is evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementDefinition {
    pub kind: RequirementKind,
    pub label: String,
    /// `None` or `Some(0)` is trivially met.
    #[serde(default)]
    pub required: Option<u32>,
}

impl RequirementDefinition {
    pub fn new(kind: RequirementKind, label: &str, required: u32) -> Self {
        Self {
            kind,
            label: label.to_string(),
            required: Some(required),
        }
    }
}

/// An evaluated requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryRequirement {
    pub kind: RequirementKind,
    pub label: String,
    pub current: u32,
    pub required: Option<u32>,
    pub met: bool,
}

impl MasteryRequirement {
    /// `min(current / required, 1)`; 1 when nothing is required.
    pub fn ratio(&self) -> f64 {
        match self.required {
            Some(required) if required > 0 => (f64::from(self.current) / f64::from(required)).min(1.0),
            _ => 1.0,
        }
    }

    /// Progress bar percentage, capped at 100.
    pub fn percentage(&self) -> u32 {
        match self.required {
            Some(required) if required > 0 => {
                let pct = u64::from(self.current) * 100 / u64::from(required);
                pct.min(100) as u32
            }
            _ => 100,
        }
    }
}

/// The outcome of evaluating a gate against a learner's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryEvaluation {
    pub module_id: String,
    pub requirements: Vec<MasteryRequirement>,
    pub all_met: bool,
}

impl MasteryEvaluation {
    pub fn met_count(&self) -> usize {
        self.requirements.iter().filter(|r| r.met).count()
    }

    /// Mean requirement ratio in `0.0..=1.0`. A gate with no requirements is
    /// fully complete.
    pub fn completion_ratio(&self) -> f64 {
        if self.requirements.is_empty() {
            return 1.0;
        }
        self.requirements.iter().map(|r| r.ratio()).sum::<f64>() / self.requirements.len() as f64
    }

    /// Whether any requirement has progress recorded against it.
    pub fn is_started(&self) -> bool {
        self.requirements.iter().any(|r| r.current > 0)
    }
}

/// The requirement set a module must satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasteryGate {
    pub module_id: String,
    pub requirements: Vec<RequirementDefinition>,
}

impl MasteryGate {
    /// Lessons, labs, concept check and project, with the totals taken from
    /// the progress record itself.
    pub fn standard(progress: &ModuleProgress, concept_check_min: u32) -> Self {
        Self {
            module_id: progress.module_id.clone(),
            requirements: vec![
                RequirementDefinition::new(RequirementKind::Lessons, "Lessons", progress.total_lessons),
                RequirementDefinition::new(RequirementKind::Labs, "Labs", progress.total_labs),
                RequirementDefinition::new(
                    RequirementKind::ConceptCheck,
                    "Concept Check",
                    concept_check_min,
                ),
                RequirementDefinition::new(RequirementKind::Project, "Project", 1),
            ],
        }
    }

    /// The gate declared by a curriculum module.
    pub fn for_module(module: &ModuleDefinition, default_concept_check_min: u32) -> Self {
        Self {
            module_id: module.id.clone(),
            requirements: vec![
                RequirementDefinition::new(RequirementKind::Lessons, "Lessons", module.lessons),
                RequirementDefinition::new(RequirementKind::Labs, "Labs", module.labs),
                RequirementDefinition::new(
                    RequirementKind::ConceptCheck,
                    "Concept Check",
                    module.concept_check_min.unwrap_or(default_concept_check_min),
                ),
                RequirementDefinition::new(
                    RequirementKind::Project,
                    "Project",
                    u32::from(module.project),
                ),
            ],
        }
    }

    /// Evaluate the gate. Pure: the same progress always yields the same
    /// result.
    pub fn evaluate(&self, progress: &ModuleProgress) -> MasteryEvaluation {
        let requirements: Vec<MasteryRequirement> = self
            .requirements
            .iter()
            .map(|def| {
                let current = def.kind.current(progress);
                let met = match def.required {
                    Some(required) if required > 0 => current >= required,
                    _ => true,
                };
                MasteryRequirement {
                    kind: def.kind,
                    label: def.label.clone(),
                    current,
                    required: def.required,
                    met,
                }
            })
            .collect();
        let all_met = requirements.iter().all(|r| r.met);
        MasteryEvaluation {
            module_id: self.module_id.clone(),
            requirements,
            all_met,
        }
    }
}

/// Gates keyed by module id, falling back to the standard gate for modules
/// without a definition.
#[derive(Debug, Clone, Default)]
pub struct GateBook {
    gates: HashMap<String, MasteryGate>,
    default_concept_check_min: u32,
}

impl GateBook {
    pub fn new(default_concept_check_min: u32) -> Self {
        Self {
            gates: HashMap::new(),
            default_concept_check_min,
        }
    }

    pub fn from_curriculum(curriculum: &Curriculum, default_concept_check_min: u32) -> Self {
        let mut book = Self::new(default_concept_check_min);
        for module in &curriculum.modules {
            book.insert(MasteryGate::for_module(module, default_concept_check_min));
        }
        book
    }

    pub fn insert(&mut self, gate: MasteryGate) {
        self.gates.insert(gate.module_id.clone(), gate);
    }

    pub fn gate_for(&self, progress: &ModuleProgress) -> MasteryGate {
        self.gates
            .get(&progress.module_id)
            .cloned()
            .unwrap_or_else(|| MasteryGate::standard(progress, self.default_concept_check_min))
    }

    pub fn evaluate(&self, progress: &ModuleProgress) -> MasteryEvaluation {
        self.gate_for(progress).evaluate(progress)
    }

    /// Module ids whose gate is met.
    pub fn completed_modules<'a>(
        &self,
        records: impl IntoIterator<Item = &'a ModuleProgress>,
    ) -> HashSet<String> {
        records
            .into_iter()
            .filter(|p| self.evaluate(p).all_met)
            .map(|p| p.module_id.clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Curriculum path
// ---------------------------------------------------------------------------

/// Derived state of a module on a learner's path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    Locked,
    Available,
    Current,
    Complete,
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleState::Locked => write!(f, "locked"),
            ModuleState::Available => write!(f, "available"),
            ModuleState::Current => write!(f, "current"),
            ModuleState::Complete => write!(f, "complete"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleStatus {
    pub track_id: String,
    pub module_id: String,
    pub state: ModuleState,
}

/// Per-track state of every module plus the track's completion percentage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackStatus {
    pub track_id: String,
    pub name: String,
    pub modules: Vec<ModuleStatus>,
    pub percent_complete: u32,
}

/// Strictly sequential tracks of strictly sequential modules.
#[derive(Debug, Clone, Default)]
pub struct CurriculumPath {
    tracks: Vec<Track>,
}

impl CurriculumPath {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// The module that must be complete before `module_id` unlocks: the
    /// previous module in its track, or for a track's first module the last
    /// module of the nearest earlier non-empty track.
    pub fn prerequisite(&self, module_id: &str) -> Option<&str> {
        for (t, track) in self.tracks.iter().enumerate() {
            let Some(pos) = track.modules.iter().position(|m| m == module_id) else {
                continue;
            };
            if pos > 0 {
                return Some(track.modules[pos - 1].as_str());
            }
            return self.tracks[..t]
                .iter()
                .rev()
                .find_map(|prev| prev.modules.last())
                .map(String::as_str);
        }
        None
    }

    pub fn is_unlocked(&self, module_id: &str, complete: &HashSet<String>) -> bool {
        self.prerequisite(module_id)
            .map_or(true, |prereq| complete.contains(prereq))
    }

    /// State of a single module.
    pub fn state_of(
        &self,
        module_id: &str,
        complete: &HashSet<String>,
        current: Option<&str>,
    ) -> ModuleState {
        if !self.is_unlocked(module_id, complete) {
            ModuleState::Locked
        } else if complete.contains(module_id) {
            ModuleState::Complete
        } else if current == Some(module_id) {
            ModuleState::Current
        } else {
            ModuleState::Available
        }
    }

    /// The first unlocked module that is not complete, in path order.
    pub fn next_module(&self, complete: &HashSet<String>) -> Option<&str> {
        self.tracks
            .iter()
            .flat_map(|t| t.modules.iter())
            .find(|m| !complete.contains(*m) && self.is_unlocked(m, complete))
            .map(String::as_str)
    }

    pub fn track_progress(&self, track: &Track, complete: &HashSet<String>) -> u32 {
        if track.modules.is_empty() {
            return 0;
        }
        let done = track.modules.iter().filter(|m| complete.contains(*m)).count();
        ((done * 100 + track.modules.len() / 2) / track.modules.len()) as u32
    }

    pub fn statuses(&self, complete: &HashSet<String>, current: Option<&str>) -> Vec<TrackStatus> {
        self.tracks
            .iter()
            .map(|track| TrackStatus {
                track_id: track.id.clone(),
                name: track.name.clone(),
                modules: track
                    .modules
                    .iter()
                    .map(|m| ModuleStatus {
                        track_id: track.id.clone(),
                        module_id: m.clone(),
                        state: self.state_of(m, complete, current),
                    })
                    .collect(),
                percent_complete: self.track_progress(track, complete),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(lessons: u32, labs: (u32, u32), concept: Option<u32>, project: bool) -> ModuleProgress {
        let mut p = ModuleProgress::new("m1", "u1", 5, labs.1);
        p.lessons_completed = lessons;
        p.labs_completed = labs.0;
        p.concept_check_score = concept;
        p.project_submitted = project;
        p
    }

    #[test]
    fn one_unmet_requirement_blocks_gate() {
        let p = progress(5, (2, 3), Some(80), true);
        let eval = MasteryGate::standard(&p, 75).evaluate(&p);
        assert!(!eval.all_met);
        assert_eq!(eval.met_count(), 3);
        let labs = eval
            .requirements
            .iter()
            .find(|r| r.kind == RequirementKind::Labs)
            .unwrap();
        assert!(!labs.met);
        assert_eq!(labs.percentage(), 66);
    }

    #[test]
    fn all_requirements_met() {
        let p = progress(5, (3, 3), Some(75), true);
        let eval = MasteryGate::standard(&p, 75).evaluate(&p);
        assert!(eval.all_met);
        assert_eq!(eval.completion_ratio(), 1.0);
    }

    #[test]
    fn evaluation_is_idempotent() {
        let p = progress(3, (1, 2), Some(60), false);
        let gate = MasteryGate::standard(&p, 75);
        assert_eq!(gate.evaluate(&p), gate.evaluate(&p));
    }

    #[test]
    fn zero_or_missing_required_is_trivially_met() {
        let p = progress(0, (0, 0), None, false);
        let gate = MasteryGate {
            module_id: "m1".into(),
            requirements: vec![
                RequirementDefinition::new(RequirementKind::Labs, "Labs", 0),
                RequirementDefinition {
                    kind: RequirementKind::Project,
                    label: "Project".into(),
                    required: None,
                },
            ],
        };
        let eval = gate.evaluate(&p);
        assert!(eval.all_met);
        assert!(eval.requirements.iter().all(|r| r.percentage() == 100));
    }

    #[test]
    fn percentage_is_capped() {
        let req = MasteryRequirement {
            kind: RequirementKind::ConceptCheck,
            label: "Concept Check".into(),
            current: 100,
            required: Some(75),
            met: true,
        };
        assert_eq!(req.percentage(), 100);
        assert_eq!(req.ratio(), 1.0);
    }

    #[test]
    fn module_without_project_skips_it() {
        let module = ModuleDefinition {
            id: "m1".into(),
            title: "Basics".into(),
            lessons: 2,
            labs: 0,
            concept_check_min: Some(80),
            project: false,
            questions: vec![],
        };
        let mut p = module.new_progress("u1");
        p.lessons_completed = 2;
        p.concept_check_score = Some(80);
        assert!(MasteryGate::for_module(&module, 75).evaluate(&p).all_met);
    }

    fn path() -> CurriculumPath {
        CurriculumPath::new(vec![
            Track {
                id: "foundations".into(),
                name: "Foundations".into(),
                modules: vec!["f1".into(), "f2".into()],
            },
            Track {
                id: "empty".into(),
                name: "Empty".into(),
                modules: vec![],
            },
            Track {
                id: "advanced".into(),
                name: "Advanced".into(),
                modules: vec!["a1".into(), "a2".into()],
            },
        ])
    }

    fn set(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn prerequisites_chain_across_tracks() {
        let path = path();
        assert_eq!(path.prerequisite("f1"), None);
        assert_eq!(path.prerequisite("f2"), Some("f1"));
        assert_eq!(path.prerequisite("a1"), Some("f2"));
        assert_eq!(path.prerequisite("a2"), Some("a1"));
    }

    #[test]
    fn module_states() {
        let path = path();
        let complete = set(&["f1"]);
        assert_eq!(path.state_of("f1", &complete, Some("f2")), ModuleState::Complete);
        assert_eq!(path.state_of("f2", &complete, Some("f2")), ModuleState::Current);
        assert_eq!(path.state_of("f2", &complete, None), ModuleState::Available);
        assert_eq!(path.state_of("a1", &complete, None), ModuleState::Locked);
        assert_eq!(path.next_module(&complete), Some("f2"));
    }

    #[test]
    fn complete_never_regresses_to_locked() {
        let path = path();
        let mut complete = set(&[]);
        let order = ["f1", "f2", "a1", "a2"];
        let mut seen_complete: Vec<&str> = vec![];
        for id in order {
            complete.insert(id.to_string());
            seen_complete.push(id);
            for done in &seen_complete {
                assert_eq!(path.state_of(done, &complete, None), ModuleState::Complete);
            }
        }
    }

    #[test]
    fn track_progress_and_statuses() {
        let path = path();
        let complete = set(&["f1", "f2", "a1"]);
        let statuses = path.statuses(&complete, Some("a2"));
        assert_eq!(statuses[0].percent_complete, 100);
        assert_eq!(statuses[1].percent_complete, 0);
        assert_eq!(statuses[2].percent_complete, 50);
        assert_eq!(statuses[2].modules[1].state, ModuleState::Current);
    }
}

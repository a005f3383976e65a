//! Takeoff session
//!
//! Owns everything needed to measure one plan: the tool state, the attributes
//! for the next shape, page calibrations and the measure list. Events go
//! through the pure state machine; the session applies the resulting effect to
//! its own view first and then writes it to the record store. A store failure
//! is reported in the outcome but never undoes the in-memory change.

use tracing::{debug, info, warn};

use crate::calibration::{Calibration, CalibrationBook, PageKey};
use crate::config::EngineConfig;
use crate::error::{StoreError, TakeoffError, TakeoffResult};
use crate::geometry::Point;
use crate::measure::{Color, Measure, MeasureAttributes, MeasureId};
use crate::overlay::{self, DrawInstruction, OverlayInput, OverlayStyle, ViewTransform};
use crate::store::RecordStore;
use crate::tool::{self, Effect, Tool, ToolEvent, ToolState, TransitionContext};

/// What a dispatched event changed
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// Measure created, or recreated under the same id
    pub persisted: Option<MeasureId>,
    /// Page whose calibration was stored
    pub calibrated: Option<PageKey>,
    /// Measure picked by the select tool
    pub selected: Option<MeasureId>,
    /// Failed store writes; the in-memory state keeps the change
    pub store_errors: Vec<StoreError>,
}

impl DispatchOutcome {
    pub fn is_synced(&self) -> bool {
        self.store_errors.is_empty()
    }
}

pub struct TakeoffSession<S: RecordStore> {
    store: S,
    config: EngineConfig,
    page: PageKey,
    state: ToolState,
    attributes: MeasureAttributes,
    calibrations: CalibrationBook,
    measures: Vec<Measure>,
    selected: Option<MeasureId>,
}

impl<S: RecordStore> TakeoffSession<S> {
    /// Start an empty session on page 1 of `plan_id`
    pub fn new(store: S, plan_id: impl Into<String>, config: EngineConfig) -> Self {
        let attributes = MeasureAttributes {
            unit_price: config.default_unit_price,
            ..MeasureAttributes::default()
        };
        Self {
            store,
            config,
            page: PageKey::new(plan_id, 1),
            state: ToolState::default(),
            attributes,
            calibrations: CalibrationBook::new(),
            measures: Vec::new(),
            selected: None,
        }
    }

    /// Start a session seeded with the plan's stored measures and calibrations
    pub fn open(
        store: S,
        plan_id: impl Into<String>,
        config: EngineConfig,
    ) -> Result<Self, StoreError> {
        let mut session = Self::new(store, plan_id, config);
        let plan_id = session.page.plan_id.clone();

        session.measures = session.store.list_measures(Some(&plan_id))?;
        session.calibrations = session
            .store
            .list_calibrations()?
            .into_iter()
            .filter(|c| c.scope().plan_id == plan_id)
            .collect();

        info!(
            plan_id = %plan_id,
            measures = session.measures.len(),
            calibrations = session.calibrations.len(),
            "opened takeoff session"
        );
        Ok(session)
    }

    pub fn page(&self) -> &PageKey {
        &self.page
    }

    /// Switch to another page of the plan; anything being drawn is dropped
    pub fn set_page(&mut self, page: u32) {
        if page == self.page.page {
            return;
        }
        let tool = self.state.active_tool();
        self.state = ToolState::Idle { tool };
        self.selected = None;
        self.page.page = page;
        debug!(page = %self.page, "page changed");
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tool_state(&self) -> &ToolState {
        &self.state
    }

    pub fn attributes(&self) -> &MeasureAttributes {
        &self.attributes
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.attributes.label = label.into();
    }

    pub fn set_category(&mut self, category: impl Into<String>) {
        self.attributes.category = category.into();
    }

    pub fn set_color(&mut self, color: Color) {
        self.attributes.color = color;
    }

    pub fn set_unit_price(&mut self, unit_price: f64) {
        self.attributes.unit_price = unit_price;
    }

    /// Every measure of the plan, in creation order
    pub fn measures(&self) -> &[Measure] {
        &self.measures
    }

    /// Measures on the current page
    pub fn page_measures(&self) -> impl Iterator<Item = &Measure> {
        self.measures.iter().filter(|m| m.is_on(&self.page))
    }

    pub fn measure(&self, id: MeasureId) -> Option<&Measure> {
        self.measures.iter().find(|m| m.id() == id)
    }

    /// Sum of total prices on the current page
    pub fn page_total(&self) -> f64 {
        self.page_measures().map(Measure::total_price).sum()
    }

    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibrations.get(&self.page)
    }

    pub fn selected(&self) -> Option<MeasureId> {
        self.selected
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Feed one event through the tool state machine and apply its effect
    ///
    /// # Errors
    /// Returns the recoverable error produced by the transition. The tool
    /// state is already reset to a well-defined state when this happens.
    pub fn dispatch(&mut self, event: ToolEvent) -> TakeoffResult<DispatchOutcome> {
        debug!(page = %self.page, ?event, "dispatch");

        let state = std::mem::take(&mut self.state);
        let ctx = TransitionContext {
            page: &self.page,
            calibration: self.calibrations.get(&self.page),
            attributes: &self.attributes,
            config: &self.config,
        };
        let (next, result) = tool::transition(state, event, &ctx);
        self.state = next;

        match result {
            Ok(effect) => Ok(self.apply(effect)),
            Err(error) => {
                warn!(page = %self.page, %error, "takeoff operation rejected");
                Err(error)
            }
        }
    }

    pub fn select_tool(&mut self, tool: Tool) -> TakeoffResult<DispatchOutcome> {
        self.dispatch(ToolEvent::SelectTool(tool))
    }

    /// Click at a canonical point
    pub fn click(&mut self, point: Point) -> TakeoffResult<DispatchOutcome> {
        self.dispatch(ToolEvent::Click(point))
    }

    /// Click at a screen point under the given view transform
    pub fn click_screen(
        &mut self,
        point: Point,
        transform: &ViewTransform,
    ) -> TakeoffResult<DispatchOutcome> {
        self.click(transform.screen_to_canonical(point))
    }

    pub fn double_click(&mut self) -> TakeoffResult<DispatchOutcome> {
        self.dispatch(ToolEvent::DoubleClick)
    }

    pub fn finish(&mut self) -> TakeoffResult<DispatchOutcome> {
        self.dispatch(ToolEvent::Finish)
    }

    pub fn cancel(&mut self) -> TakeoffResult<DispatchOutcome> {
        self.dispatch(ToolEvent::Cancel)
    }

    pub fn undo_point(&mut self) -> TakeoffResult<DispatchOutcome> {
        self.dispatch(ToolEvent::UndoPoint)
    }

    pub fn submit_calibration(
        &mut self,
        real_distance: f64,
        real_unit: impl Into<String>,
    ) -> TakeoffResult<DispatchOutcome> {
        self.dispatch(ToolEvent::SubmitCalibration {
            real_distance,
            real_unit: real_unit.into(),
        })
    }

    /// Remove a measure from the session and the store
    ///
    /// # Errors
    /// `MeasureNotFound` if the session does not hold `id`.
    pub fn delete_measure(&mut self, id: MeasureId) -> TakeoffResult<DispatchOutcome> {
        let index = self
            .measures
            .iter()
            .position(|m| m.id() == id)
            .ok_or(TakeoffError::MeasureNotFound(id))?;
        self.measures.remove(index);
        if self.selected == Some(id) {
            self.selected = None;
        }
        // A running count must not rebuild the measure it was growing
        if let ToolState::Accumulating {
            count_id: Some(count_id),
            ..
        } = self.state
        {
            if count_id == id {
                self.state = ToolState::Idle { tool: Tool::Count };
            }
        }
        info!(%id, "measure deleted");

        let mut outcome = DispatchOutcome::default();
        if let Err(error) = self.store.delete_measure(id) {
            warn!(%id, %error, "store delete failed");
            outcome.store_errors.push(error);
        }
        Ok(outcome)
    }

    /// Draw list for the current page
    pub fn overlay(&self, transform: &ViewTransform, style: &OverlayStyle) -> Vec<DrawInstruction> {
        overlay::render_overlay(
            &OverlayInput {
                page: &self.page,
                measures: &self.measures,
                tool_state: &self.state,
                calibration: self.calibration(),
                pending_color: self.attributes.color,
                transform,
            },
            style,
        )
    }

    fn apply(&mut self, effect: Effect) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();

        match effect {
            Effect::None => {}
            Effect::PersistMeasure { measure, replaces } => {
                if let Some(old) = replaces {
                    self.measures.retain(|m| m.id() != old);
                    if let Err(error) = self.store.delete_measure(old) {
                        warn!(id = %old, %error, "store delete failed");
                        outcome.store_errors.push(error);
                    }
                }

                info!(
                    id = %measure.id(),
                    kind = %measure.kind(),
                    value = measure.value(),
                    unit = measure.unit(),
                    total_price = measure.total_price(),
                    "measure finalized"
                );
                if let Err(error) = self.store.insert_measure(&measure) {
                    warn!(id = %measure.id(), %error, "store insert failed");
                    outcome.store_errors.push(error);
                }
                outcome.persisted = Some(measure.id());
                self.measures.push(measure);
            }
            Effect::StoreCalibration(calibration) => {
                let key = calibration.scope().clone();
                info!(
                    page = %key,
                    pixels_per_unit = calibration.pixels_per_unit(),
                    unit = calibration.real_unit(),
                    "page calibrated"
                );
                if let Err(error) = self.store.upsert_calibration(&calibration) {
                    warn!(page = %key, %error, "store calibration upsert failed");
                    outcome.store_errors.push(error);
                }
                self.calibrations.set(calibration);
                outcome.calibrated = Some(key);
            }
            Effect::SelectAt(point) => {
                let tolerance = self.config.hit_tolerance_px;
                // Last drawn is on top
                self.selected = self
                    .measures
                    .iter()
                    .rev()
                    .filter(|m| m.is_on(&self.page))
                    .find(|m| m.hit_test(point, tolerance))
                    .map(Measure::id);
                debug!(selected = ?self.selected, "selection updated");
                outcome.selected = self.selected;
            }
        }

        outcome
    }
}

// ============================================================================
// MARKER SET MANAGER - Reemplazo de marcadores sin parpadeo + selección
// ============================================================================
// Invariante de orden: el set nuevo se inserta completo ANTES de quitar el
// anterior, nunca al revés. La selección es un lookup por id, no un scan.
// ============================================================================

use std::collections::HashMap;

use crate::models::geo::Bounds;
use crate::models::point::DeliveryPoint;

use super::traits::{MapError, MapPort, MarkerId};

/// Resultado de aplicar un set de resultados
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// El set anterior fue reemplazado por `n` marcadores nuevos
    Replaced(usize),
    /// La búsqueda no trajo resultados; el set existente queda intacto
    NoResults,
}

/// Dueño exclusivo del set de marcadores renderizado y de la selección
pub struct MarkerSetManager {
    next_id: MarkerId,
    current: Vec<MarkerId>,
    points: HashMap<MarkerId, DeliveryPoint>,
    selected: Option<MarkerId>,
    auto_fit_done: bool,
    fit_margin_px: u32,
    select_zoom: f64,
}

impl MarkerSetManager {
    pub fn new(fit_margin_px: u32, select_zoom: f64) -> Self {
        Self {
            next_id: 0,
            current: Vec::new(),
            points: HashMap::new(),
            selected: None,
            auto_fit_done: false,
            fit_margin_px,
            select_zoom,
        }
    }

    /// Reemplazar el set visible por los resultados de una búsqueda.
    ///
    /// Un resultado vacío NO limpia el set existente: eso solo ocurre via
    /// `clear` (cambio de servicio). Cualquier reemplazo invalida la
    /// selección. El auto-ajuste de vista ocurre solo en el primer resultado
    /// no vacío de la sesión.
    pub fn apply_results(
        &mut self,
        map: &mut dyn MapPort,
        points: Vec<DeliveryPoint>,
    ) -> Result<ApplyOutcome, MapError> {
        if points.is_empty() {
            return Ok(ApplyOutcome::NoResults);
        }

        let result_bounds = Bounds::enclosing(
            &points.iter().map(|p| p.coordinate).collect::<Vec<_>>(),
        );

        // Insertar el set nuevo completo
        let mut new_ids = Vec::with_capacity(points.len());
        for point in points {
            let id = self.next_id;
            self.next_id += 1;
            map.insert_marker(id, &point, false)?;
            self.points.insert(id, point);
            new_ids.push(id);
        }

        // Recién ahora quitar el anterior
        for old_id in self.current.drain(..) {
            map.remove_marker(old_id)?;
            self.points.remove(&old_id);
        }

        let count = new_ids.len();
        self.current = new_ids;
        self.selected = None;

        if !self.auto_fit_done {
            if let Some(bounds) = result_bounds {
                map.fit_bounds(bounds, self.fit_margin_px)?;
            }
            self.auto_fit_done = true;
        }

        Ok(ApplyOutcome::Replaced(count))
    }

    /// Seleccionar un marcador: restyla el nuevo, revierte el anterior y
    /// centra el mapa en el punto.
    pub fn select(
        &mut self,
        map: &mut dyn MapPort,
        id: MarkerId,
    ) -> Result<&DeliveryPoint, MapError> {
        if !self.points.contains_key(&id) {
            return Err(MapError::UnknownMarker(id));
        }

        if let Some(previous) = self.selected {
            if previous != id && self.points.contains_key(&previous) {
                map.restyle_marker(previous, false)?;
            }
        }

        map.restyle_marker(id, true)?;
        self.selected = Some(id);

        let point = &self.points[&id];
        map.set_center(point.coordinate, self.select_zoom, true)?;
        Ok(point)
    }

    /// Quitar todos los marcadores y la selección
    pub fn clear(&mut self, map: &mut dyn MapPort) -> Result<(), MapError> {
        for id in self.current.drain(..) {
            map.remove_marker(id)?;
            self.points.remove(&id);
        }
        self.selected = None;
        Ok(())
    }

    pub fn selected_point(&self) -> Option<&DeliveryPoint> {
        self.selected.and_then(|id| self.points.get(&id))
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::geo::Coordinate;
    use crate::models::point::ServiceId;

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Insert(MarkerId),
        Remove(MarkerId),
        Restyle(MarkerId, bool),
        SetCenter(f64, f64),
        FitBounds,
    }

    /// Mapa de mentira que registra operaciones y el mínimo de marcadores
    /// vivos observado durante los reemplazos
    #[derive(Default)]
    struct MockMap {
        ops: Vec<Op>,
        live: std::collections::HashSet<MarkerId>,
        min_live_during_replace: Option<usize>,
    }

    impl MapPort for MockMap {
        fn insert_marker(
            &mut self,
            id: MarkerId,
            _point: &DeliveryPoint,
            _selected: bool,
        ) -> Result<(), MapError> {
            self.live.insert(id);
            self.ops.push(Op::Insert(id));
            Ok(())
        }

        fn remove_marker(&mut self, id: MarkerId) -> Result<(), MapError> {
            self.live.remove(&id);
            let min = self.min_live_during_replace.unwrap_or(usize::MAX);
            self.min_live_during_replace = Some(min.min(self.live.len()));
            self.ops.push(Op::Remove(id));
            Ok(())
        }

        fn restyle_marker(&mut self, id: MarkerId, selected: bool) -> Result<(), MapError> {
            self.ops.push(Op::Restyle(id, selected));
            Ok(())
        }

        fn set_center(
            &mut self,
            coordinate: Coordinate,
            _zoom: f64,
            _animated: bool,
        ) -> Result<(), MapError> {
            self.ops
                .push(Op::SetCenter(coordinate.latitude(), coordinate.longitude()));
            Ok(())
        }

        fn fit_bounds(&mut self, _bounds: Bounds, _margin_px: u32) -> Result<(), MapError> {
            self.ops.push(Op::FitBounds);
            Ok(())
        }

        fn viewport(&self) -> Option<Bounds> {
            None
        }
    }

    fn point(name: &str, lat: f64, lon: f64) -> DeliveryPoint {
        DeliveryPoint {
            name: name.to_string(),
            address: format!("{} address", name),
            coordinate: Coordinate::new(lat, lon).unwrap(),
            service: ServiceId::Sdek,
        }
    }

    fn manager() -> MarkerSetManager {
        MarkerSetManager::new(40, 16.0)
    }

    #[test]
    fn replacement_inserts_before_removing() {
        let mut map = MockMap::default();
        let mut mgr = manager();

        mgr.apply_results(&mut map, vec![point("a", 55.70, 37.60), point("b", 55.71, 37.61)])
            .unwrap();
        mgr.apply_results(&mut map, vec![point("c", 55.72, 37.62)])
            .unwrap();

        // Nunca hubo un instante con cero marcadores durante el reemplazo
        assert_eq!(map.min_live_during_replace, Some(1));
        assert_eq!(mgr.len(), 1);

        // Todos los inserts del segundo set van antes que los removes del primero
        let first_remove = map.ops.iter().position(|op| matches!(op, Op::Remove(_))).unwrap();
        let last_insert = map
            .ops
            .iter()
            .rposition(|op| matches!(op, Op::Insert(_)))
            .unwrap();
        assert!(last_insert < first_remove);
    }

    #[test]
    fn empty_results_keep_existing_set() {
        let mut map = MockMap::default();
        let mut mgr = manager();

        mgr.apply_results(&mut map, vec![point("a", 55.70, 37.60)])
            .unwrap();
        let outcome = mgr.apply_results(&mut map, vec![]).unwrap();

        assert_eq!(outcome, ApplyOutcome::NoResults);
        assert_eq!(mgr.len(), 1);
        assert!(!map.ops.iter().any(|op| matches!(op, Op::Remove(_))));
    }

    #[test]
    fn explicit_clear_removes_everything() {
        let mut map = MockMap::default();
        let mut mgr = manager();

        mgr.apply_results(&mut map, vec![point("a", 55.70, 37.60), point("b", 55.71, 37.61)])
            .unwrap();
        mgr.clear(&mut map).unwrap();

        assert!(mgr.is_empty());
        assert!(mgr.selected_point().is_none());
        assert!(map.live.is_empty());
    }

    #[test]
    fn selecting_y_after_x_leaves_only_y_selected() {
        let mut map = MockMap::default();
        let mut mgr = manager();

        mgr.apply_results(&mut map, vec![point("x", 55.70, 37.60), point("y", 55.71, 37.61)])
            .unwrap();
        let ids: Vec<MarkerId> = mgr.current.clone();

        mgr.select(&mut map, ids[0]).unwrap();
        mgr.select(&mut map, ids[1]).unwrap();

        assert_eq!(mgr.selected_point().unwrap().name, "y");
        // x vuelve al estilo normal, y queda seleccionado
        assert!(map.ops.contains(&Op::Restyle(ids[0], false)));
        assert_eq!(map.ops.last(), Some(&Op::SetCenter(55.71, 37.61)));
    }

    #[test]
    fn selection_cleared_on_replacement() {
        let mut map = MockMap::default();
        let mut mgr = manager();

        mgr.apply_results(&mut map, vec![point("x", 55.70, 37.60)])
            .unwrap();
        let id = mgr.current[0];
        mgr.select(&mut map, id).unwrap();
        assert!(mgr.selected_point().is_some());

        mgr.apply_results(&mut map, vec![point("z", 55.72, 37.62)])
            .unwrap();
        assert!(mgr.selected_point().is_none());
    }

    #[test]
    fn select_unknown_marker_fails() {
        let mut map = MockMap::default();
        let mut mgr = manager();

        mgr.apply_results(&mut map, vec![point("x", 55.70, 37.60)])
            .unwrap();
        assert_eq!(
            mgr.select(&mut map, 999),
            Err(MapError::UnknownMarker(999))
        );
    }

    #[test]
    fn auto_fit_only_on_first_nonempty_result() {
        let mut map = MockMap::default();
        let mut mgr = manager();

        mgr.apply_results(&mut map, vec![point("a", 55.70, 37.60)])
            .unwrap();
        mgr.apply_results(&mut map, vec![point("b", 55.71, 37.61)])
            .unwrap();
        mgr.apply_results(&mut map, vec![point("c", 55.72, 37.62)])
            .unwrap();

        let fits = map.ops.iter().filter(|op| matches!(op, Op::FitBounds)).count();
        assert_eq!(fits, 1);
        // El primer fit ocurre después de insertar el primer set
        assert_eq!(map.ops[1], Op::FitBounds);
    }
}

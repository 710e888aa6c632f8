use crate::color::NodeColors;
use crate::geometry::{GeometrySnapshot, Lerp};
use crate::model::Tree;

/// One row per visible node: `id,label,depth,<geometry fields>,color`.
pub fn to_csv<G: Lerp + Default>(
    snapshot: &GeometrySnapshot<G>,
    tree: &Tree,
    colors: &NodeColors,
    mut w: impl std::io::Write,
) -> csv::Result<()> {
    let mut writer = csv::Writer::from_writer(&mut w);
    let mut header = vec!["id", "label", "depth"];
    header.extend(G::default().fields().iter().map(|(name, _)| *name));
    header.push("color");
    writer.write_record(&header)?;

    for e in snapshot.iter() {
        let mut row = vec![
            e.id.clone(),
            tree.node(e.node).label.clone(),
            e.depth.to_string(),
        ];
        row.extend(e.geometry.fields().iter().map(|(_, v)| v.to_string()));
        row.push(colors.get(e.node).to_string());
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn to_json<G: Lerp>(snapshot: &GeometrySnapshot<G>, tree: &Tree, colors: &NodeColors) -> serde_json::Value {
    serde_json::json!({
        "focus": snapshot.focus,
        "entries": snapshot.iter().map(|e| {
            let node = tree.node(e.node);
            let geometry: serde_json::Map<String, serde_json::Value> = e
                .geometry
                .fields()
                .iter()
                .map(|(k, v)| (k.to_string(), serde_json::json!(v)))
                .collect();
            serde_json::json!({
                "id": e.id,
                "label": node.label,
                "parent": node.parent.map(|p| tree.node(p).key.clone()),
                "depth": e.depth,
                "value": node.value,
                "declared": node.declared,
                "geometry": geometry,
                "color": colors.get(e.node),
            })
        }).collect::<Vec<_>>()
    })
}

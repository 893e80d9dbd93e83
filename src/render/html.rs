use crate::view::ReportData;

/// Render a self-contained HTML report (data embedded as JSON).
///
/// The page is built with `replace` rather than `format!()` because the JS
/// template literals (`${x}`) would clash with Rust format braces.
pub fn render_html_report(data: &ReportData) -> anyhow::Result<String> {
    // Record text lands inside <script>; "</script>" must not close it early.
    let json = serde_json::to_string(data)?.replace('<', "\\u003c");

    const TEMPLATE: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Chip Log Report</title>
<style>
  body { font-family: system-ui, -apple-system, Segoe UI, Roboto, Arial, sans-serif; margin: 0; }
  header { padding: 12px 16px; border-bottom: 1px solid #ddd; }
  .container { display: flex; height: calc(100vh - 84px); }
  .sidebar { width: 380px; border-right: 1px solid #ddd; padding: 12px; overflow: auto; }
  .main { flex: 1; padding: 12px; overflow: auto; }

  .summary { display: flex; gap: 16px; flex-wrap: wrap; font-size: 14px; color: #333; }
  .pill { padding: 4px 8px; border: 1px solid #ddd; border-radius: 999px; background: #fafafa; }
  .filters { margin-top: 6px; font-size: 13px; color: #555; }

  .tree-node { cursor: pointer; user-select: none; padding: 2px 4px; border-radius: 4px; }
  .tree-node:hover { background: #f3f3f3; }
  .tree-node.selected { background: #e9f2ff; border: 1px solid #cfe3ff; }
  .tree-node.disabled { color: #999; }
  .tree-node.quiet .count { display: none; }
  .indent { display: inline-block; }
  .toggle { display: inline-block; width: 16px; text-align: center; color: #666; }
  .muted { color: #777; font-size: 12px; }

  table { border-collapse: collapse; width: 100%; margin-top: 8px; }
  th, td { border-bottom: 1px solid #eee; padding: 6px 8px; text-align: left; font-size: 14px; }
  th { position: sticky; top: 0; background: white; border-bottom: 1px solid #ddd; }
  .num { text-align: right; font-variant-numeric: tabular-nums; }
</style>
</head>
<body>
<header>
  <div class="summary" id="summary"></div>
  <div class="filters" id="filters"></div>
</header>

<div class="container">
  <div class="sidebar">
    <div style="display:flex; gap: 8px; margin-bottom: 8px;">
      <label><input type="checkbox" id="onlyActive"> only nodes with logs</label>
      <button id="expandAll" style="padding: 6px 10px;">Expand</button>
      <button id="collapseAll" style="padding: 6px 10px;">Collapse</button>
    </div>
    <div id="tree"></div>
  </div>

  <div class="main">
    <h2 id="title">Select a node</h2>
    <div id="meta" class="muted"></div>

    <table id="kidsTable" style="display:none;">
      <thead>
        <tr>
          <th>id</th>
          <th>kind</th>
          <th>position</th>
          <th class="num">own logs</th>
          <th class="num">total logs</th>
        </tr>
      </thead>
      <tbody id="kidsBody"></tbody>
    </table>
  </div>
</div>

<script>
const DATA = __DATA__;

// Flatten the nested views into one keyed map; keys are tree paths.
const NODES = new Map();
const ROOTS = [];

function register(node, key) {
  NODES.set(key, node);
  node._key = key;
  (node.children || []).forEach((c, i) => register(c, key + "/" + i));
}

DATA.dies.forEach((d, i) => { register(d, "die" + i); ROOTS.push("die" + i); });
register(DATA.host_interface, "host"); ROOTS.push("host");
register(DATA.die2die, "d2d"); ROOTS.push("d2d");

const state = {
  expanded: new Set(),
  selected: null,
  onlyActive: false
};

function escapeHtml(s) {
  return String(s)
    .replaceAll("&", "&amp;")
    .replaceAll("<", "&lt;")
    .replaceAll(">", "&gt;")
    .replaceAll('"', "&quot;")
    .replaceAll("'", "&#39;");
}

function title(node) {
  const base = node.label ? `${node.label} (${node.kind})` : node.kind;
  return node.position ? `${base} [${node.position.join(", ")}]` : base;
}

function renderSummary() {
  const t = DATA.totals;
  document.getElementById("summary").innerHTML = `
    <span class="pill">attached records: <b>${t.records}</b></span>
    <span class="pill">dies loaded: <b>${t.dies_loaded}</b></span>
    <span class="pill">clusters: <b>${t.clusters}</b></span>
    <span class="pill">enabled clusters: <b>${t.enabled_clusters}</b></span>
    ${t.enablement_applied ? "" : '<span class="pill">enablement not applied</span>'}
  `;
  const f = DATA.filters;
  document.getElementById("filters").textContent =
    f.length ? ("filters: " + f.join(" | ")) : "no filters";
}

function renderTree() {
  const root = document.getElementById("tree");
  root.innerHTML = "";

  function renderSubtree(key, depth) {
    const node = NODES.get(key);
    if (!node) return;
    if (state.onlyActive && node.total_logs === 0) return;

    const isExpanded = state.expanded.has(key);
    const hasKids = node.children && node.children.length > 0;

    const row = document.createElement("div");
    let cls = "tree-node";
    if (state.selected === key) cls += " selected";
    if (node.is_enable === false) cls += " disabled";
    if (node.total_logs === 0) cls += " quiet";
    row.className = cls;
    row.onclick = () => selectNode(key);

    const indent = document.createElement("span");
    indent.className = "indent";
    indent.style.width = (depth * 16) + "px";
    row.appendChild(indent);

    const toggle = document.createElement("span");
    toggle.className = "toggle";
    toggle.textContent = hasKids ? (isExpanded ? "▾" : "▸") : " ";
    toggle.onclick = (e) => {
      e.stopPropagation();
      if (!hasKids) return;
      if (isExpanded) state.expanded.delete(key);
      else state.expanded.add(key);
      renderTree();
    };
    row.appendChild(toggle);

    const label = document.createElement("span");
    label.innerHTML = `${escapeHtml(title(node))} <span class="muted count">(${node.total_logs})</span>`;
    row.appendChild(label);

    root.appendChild(row);

    if (hasKids && isExpanded) {
      node.children.forEach((c) => renderSubtree(c._key, depth + 1));
    }
  }

  for (const r of ROOTS) renderSubtree(r, 0);
}

function selectNode(key) {
  state.selected = key;
  const node = NODES.get(key);
  document.getElementById("title").textContent = title(node);

  const enable = node.is_enable === undefined ? "" : ` | enabled: ${node.is_enable}`;
  document.getElementById("meta").textContent =
    `id: ${node.id} | own logs: ${node.own_logs} | total logs: ${node.total_logs}` + enable;

  const tbl = document.getElementById("kidsTable");
  const body = document.getElementById("kidsBody");
  body.innerHTML = "";

  if (!node.children || node.children.length === 0) {
    tbl.style.display = "none";
  } else {
    tbl.style.display = "table";
    for (const c of node.children) {
      const tr = document.createElement("tr");
      tr.innerHTML = `
        <td>${c.id}</td>
        <td>${escapeHtml(c.label || c.kind)}</td>
        <td>${c.position ? c.position.join(", ") : ""}</td>
        <td class="num">${c.own_logs}</td>
        <td class="num">${c.total_logs}</td>
      `;
      tr.onclick = () => selectNode(c._key);
      body.appendChild(tr);
    }
  }

  renderTree();
}

function expandAll() {
  for (const [key, node] of NODES) {
    if (node.children && node.children.length) state.expanded.add(key);
  }
  renderTree();
}

function collapseAll() {
  state.expanded.clear();
  renderTree();
}

document.getElementById("onlyActive").addEventListener("change", (e) => {
  state.onlyActive = e.target.checked;
  renderTree();
});

document.getElementById("expandAll").onclick = expandAll;
document.getElementById("collapseAll").onclick = collapseAll;

renderSummary();
for (const r of ROOTS) state.expanded.add(r);
renderTree();
if (ROOTS.length) selectNode(ROOTS[0]);
</script>
</body>
</html>
"#;

    Ok(TEMPLATE.replace("__DATA__", &json))
}

use crate::types::{AcquisitionMode, Polarization, ProductType, S1Error, S1Result, Scale};
use quick_xml::events::BytesText;
use quick_xml::Writer;
use std::path::{Path, PathBuf};

/// Format SNAP writes intermediate products in
pub const SNAP_OUTPUT_FORMAT: &str = "BEAM-DIMAP";

/// Which graph to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphKind {
    /// Thermal noise removal + sigma0 calibration (+ speckle filter) (+ dB)
    Intensity {
        mode: AcquisitionMode,
        product_type: ProductType,
        speckle: bool,
        scale: Scale,
    },
    IncidenceAngle,
    Latitude,
    Longitude,
}

impl GraphKind {
    /// Graph file name relative to a SNAP graph directory
    pub fn relative_path(&self) -> S1Result<PathBuf> {
        match self {
            GraphKind::Intensity {
                mode,
                product_type,
                speckle,
                scale,
            } => {
                Self::check_intensity_support(*mode, *product_type)?;
                let spk = if *speckle { "_Spk" } else { "" };
                let db = match scale {
                    Scale::Linear => "",
                    Scale::Decibel => "_dB",
                };
                let folder = format!("S1_{}_{}", mode, product_type);
                Ok(PathBuf::from(&folder).join(format!("{}_NR_Cal{}{}_XX.xml", folder, spk, db)))
            }
            GraphKind::IncidenceAngle => Ok(PathBuf::from("S1_meta/S1_IA.xml")),
            GraphKind::Latitude => Ok(PathBuf::from("S1_meta/S1_lat.xml")),
            GraphKind::Longitude => Ok(PathBuf::from("S1_meta/S1_lon.xml")),
        }
    }

    /// Intensity graphs exist for EW GRDM, EW GRDH and IW GRDH
    fn check_intensity_support(mode: AcquisitionMode, product_type: ProductType) -> S1Result<()> {
        match (mode, product_type) {
            (AcquisitionMode::EW, ProductType::GRDM)
            | (AcquisitionMode::EW, ProductType::GRDH)
            | (AcquisitionMode::IW, ProductType::GRDH) => Ok(()),
            _ => {
                log::error!("Given product mode and settings not implemented yet");
                Err(S1Error::Unsupported(format!(
                    "no intensity graph for {} {} products",
                    mode, product_type
                )))
            }
        }
    }

    /// Name of the band SNAP writes into `<out>.data/`
    pub fn output_band(&self, pol: Option<Polarization>) -> String {
        match self {
            GraphKind::Intensity { scale, .. } => {
                let pol = pol.map(|p| p.to_string()).unwrap_or_else(|| "XX".to_string());
                format!("Sigma0_{}{}", pol, scale.suffix())
            }
            GraphKind::IncidenceAngle => "incAngle".to_string(),
            GraphKind::Latitude => "lat".to_string(),
            GraphKind::Longitude => "lon".to_string(),
        }
    }

    /// Built-in operator chain for this graph
    pub fn build(&self) -> S1Result<SnapGraph> {
        let mut graph = SnapGraph::new();
        graph.push(
            GraphNode::new("Read", "Read")
                .param("file", "${inFile}")
                .param("copyMetadata", "true"),
        );

        match self {
            GraphKind::Intensity {
                mode,
                product_type,
                speckle,
                scale,
            } => {
                Self::check_intensity_support(*mode, *product_type)?;
                graph.push(
                    GraphNode::new("ThermalNoiseRemoval", "ThermalNoiseRemoval")
                        .source("Read")
                        .param("selectedPolarisations", "${polarization}")
                        .param("removeThermalNoise", "true"),
                );
                graph.push(
                    GraphNode::new("Calibration", "Calibration")
                        .source("ThermalNoiseRemoval")
                        .param("selectedPolarisations", "${polarization}")
                        .param("outputImageScaleInDb", "false")
                        .param("outputSigmaBand", "true"),
                );
                let mut last = "Calibration";
                if *speckle {
                    graph.push(
                        GraphNode::new("Speckle-Filter", "Speckle-Filter")
                            .source(last)
                            .param("filter", "Boxcar")
                            .param("filterSizeX", "${looks_rg}")
                            .param("filterSizeY", "${looks_az}"),
                    );
                    last = "Speckle-Filter";
                }
                if *scale == Scale::Decibel {
                    graph.push(GraphNode::new("LinearToFromdB", "LinearToFromdB").source(last));
                    last = "LinearToFromdB";
                }
                graph.push(Self::write_node(last));
            }
            GraphKind::IncidenceAngle | GraphKind::Latitude | GraphKind::Longitude => {
                let (name, expression, unit) = match self {
                    GraphKind::IncidenceAngle => ("incAngle", "incident_angle", "deg"),
                    GraphKind::Latitude => ("lat", "latitude", "deg"),
                    _ => ("lon", "longitude", "deg"),
                };
                graph.push(
                    GraphNode::new("BandMaths", "BandMaths")
                        .source("Read")
                        .target_band(TargetBand {
                            name: name.to_string(),
                            expression: expression.to_string(),
                            unit: unit.to_string(),
                        }),
                );
                graph.push(Self::write_node("BandMaths"));
            }
        }

        Ok(graph)
    }

    fn write_node(source: &str) -> GraphNode {
        GraphNode::new("Write", "Write")
            .source(source)
            .param("file", "${outFile}")
            .param("formatName", SNAP_OUTPUT_FORMAT)
    }
}

/// Output band definition of a BandMaths node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetBand {
    pub name: String,
    pub expression: String,
    pub unit: String,
}

/// One operator node of a SNAP graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub id: String,
    pub operator: String,
    pub sources: Vec<String>,
    pub parameters: Vec<(String, String)>,
    pub target_bands: Vec<TargetBand>,
}

impl GraphNode {
    pub fn new(id: &str, operator: &str) -> Self {
        Self {
            id: id.to_string(),
            operator: operator.to_string(),
            sources: Vec::new(),
            parameters: Vec::new(),
            target_bands: Vec::new(),
        }
    }

    pub fn source(mut self, id: &str) -> Self {
        self.sources.push(id.to_string());
        self
    }

    pub fn param(mut self, key: &str, value: &str) -> Self {
        self.parameters.push((key.to_string(), value.to_string()));
        self
    }

    pub fn target_band(mut self, band: TargetBand) -> Self {
        self.target_bands.push(band);
        self
    }
}

/// Declarative chain of SNAP operators, rendered to graph XML for gpt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapGraph {
    pub nodes: Vec<GraphNode>,
}

impl SnapGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: GraphNode) {
        self.nodes.push(node);
    }

    pub fn operators(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.operator.as_str()).collect()
    }

    /// Render the graph as SNAP graph XML
    pub fn to_xml(&self) -> S1Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        writer
            .create_element("graph")
            .with_attribute(("id", "Graph"))
            .write_inner_content(|w| {
                w.create_element("version")
                    .write_text_content(BytesText::new("1.0"))?;

                for node in &self.nodes {
                    w.create_element("node")
                        .with_attribute(("id", node.id.as_str()))
                        .write_inner_content(|w| {
                            w.create_element("operator")
                                .write_text_content(BytesText::new(&node.operator))?;

                            let sources = w.create_element("sources");
                            if node.sources.is_empty() {
                                sources.write_empty()?;
                            } else {
                                sources.write_inner_content(|w| {
                                    for (i, source) in node.sources.iter().enumerate() {
                                        let tag = if i == 0 {
                                            "sourceProduct".to_string()
                                        } else {
                                            format!("sourceProduct.{}", i)
                                        };
                                        w.create_element(tag.as_str())
                                            .with_attribute(("refid", source.as_str()))
                                            .write_empty()?;
                                    }
                                    Ok::<(), quick_xml::Error>(())
                                })?;
                            }

                            w.create_element("parameters")
                                .with_attribute(("class", "com.bc.ceres.binding.dom.XppDomElement"))
                                .write_inner_content(|w| {
                                    for (key, value) in &node.parameters {
                                        w.create_element(key.as_str())
                                            .write_text_content(BytesText::new(value))?;
                                    }
                                    if !node.target_bands.is_empty() {
                                        w.create_element("targetBands").write_inner_content(|w| {
                                            for band in &node.target_bands {
                                                w.create_element("targetBand").write_inner_content(
                                                    |w| {
                                                        w.create_element("name").write_text_content(
                                                            BytesText::new(&band.name),
                                                        )?;
                                                        w.create_element("type").write_text_content(
                                                            BytesText::new("float32"),
                                                        )?;
                                                        w.create_element("expression")
                                                            .write_text_content(BytesText::new(
                                                                &band.expression,
                                                            ))?;
                                                        w.create_element("unit").write_text_content(
                                                            BytesText::new(&band.unit),
                                                        )?;
                                                        w.create_element("noDataValue")
                                                            .write_text_content(BytesText::new(
                                                                "0.0",
                                                            ))?;
                                                        Ok::<(), quick_xml::Error>(())
                                                    },
                                                )?;
                                            }
                                            Ok::<(), quick_xml::Error>(())
                                        })?;
                                    }
                                    Ok::<(), quick_xml::Error>(())
                                })?;
                            Ok::<(), quick_xml::Error>(())
                        })?;
                }
                Ok::<(), quick_xml::Error>(())
            })
            .map_err(|e| S1Error::XmlParsing(format!("Failed to render graph XML: {}", e)))?;

        String::from_utf8(writer.into_inner())
            .map_err(|e| S1Error::XmlParsing(format!("Graph XML is not UTF-8: {}", e)))
    }

    /// Write the rendered graph to `path`
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> S1Result<PathBuf> {
        let xml = self.to_xml()?;
        std::fs::write(path.as_ref(), xml)?;
        Ok(path.as_ref().to_path_buf())
    }
}

/// Resolves graph files: from a SNAP graph directory, or rendered built-ins
#[derive(Debug, Clone, Default)]
pub struct GraphCatalog {
    graph_dir: Option<PathBuf>,
}

impl GraphCatalog {
    pub fn new(graph_dir: Option<PathBuf>) -> Self {
        Self { graph_dir }
    }

    /// Path of the graph file to hand to gpt.
    /// Built-in graphs are written into `scratch_dir`.
    pub fn resolve(&self, kind: &GraphKind, scratch_dir: &Path) -> S1Result<PathBuf> {
        let relative = kind.relative_path()?;
        log::debug!("snap_graph_file: {}", relative.display());

        match &self.graph_dir {
            Some(dir) => {
                let path = dir.join(&relative);
                if !path.is_file() {
                    log::error!("Cannot find snap_graph_path: {}", path.display());
                    return Err(S1Error::not_found("SNAP graph", path));
                }
                Ok(path)
            }
            None => {
                let file_name = relative
                    .file_name()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("graph.xml"));
                kind.build()?.write_to(scratch_dir.join(file_name))
            }
        }
    }
}

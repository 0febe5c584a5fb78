use std::path::{Path, PathBuf};

use time::OffsetDateTime;

use crate::{
    bridge::{random_token, ContractUpload, DataBridge, UploadReceipt},
    document::DocumentModel,
    error::{ContextError, ExportError, ExportStage},
    layout::LayoutSource,
    loader::ResourceLoader,
    paginate::{Margins, PageGeometry, Paginator},
    raster::{LayoutRenderer, PageRasterizer, RasterOptions, SectionRenderer},
    typeface::FontFace,
};

/// A finished PDF together with what is known about how it was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedDocument {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub geometry: PageGeometry,
    pub margins: Margins,
    pub page_count: usize,
    /// The width over height of the raster of every page, in page order.
    pub page_aspect_ratios: Vec<f32>,
    /// The sections which could not be rasterized and are missing from the PDF.
    pub skipped_sections: Vec<String>,
}

/// Where an exported document ended up.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Saved(PathBuf),
    Uploaded(UploadReceipt),
}

/// The destination of an exported document.
pub trait ExportSink {
    fn deliver(
        &mut self,
        document: &ExportedDocument,
        model: &DocumentModel,
    ) -> Result<Delivery, ContextError>;
}

/// Saves the document under its suggested name in a directory.
pub struct LocalDownload {
    directory: PathBuf,
}

impl LocalDownload {
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        LocalDownload {
            directory: directory.into(),
        }
    }
}

impl ExportSink for LocalDownload {
    fn deliver(
        &mut self,
        document: &ExportedDocument,
        _model: &DocumentModel,
    ) -> Result<Delivery, ContextError> {
        std::fs::create_dir_all(&self.directory).map_err(|error| {
            ContextError::with_error(
                format!("Unable to create the directory {:?}", self.directory),
                &error,
            )
        })?;
        let file_path = self.directory.join(&document.file_name);
        std::fs::write(&file_path, &document.bytes).map_err(|error| {
            ContextError::with_error(format!("Unable to write the PDF {:?}", file_path), &error)
        })?;
        log::info!("Saved the PDF document to {:?}", file_path);

        Ok(Delivery::Saved(file_path))
    }
}

/// Uploads the document to the backend, attached to a lead.
pub struct BridgeUpload<'a> {
    bridge: &'a dyn DataBridge,
    lead_id: String,
}

impl<'a> BridgeUpload<'a> {
    pub fn new<S: Into<String>>(bridge: &'a dyn DataBridge, lead_id: S) -> Self {
        BridgeUpload {
            bridge,
            lead_id: lead_id.into(),
        }
    }
}

impl ExportSink for BridgeUpload<'_> {
    fn deliver(
        &mut self,
        document: &ExportedDocument,
        model: &DocumentModel,
    ) -> Result<Delivery, ContextError> {
        let receipt = self
            .bridge
            .upload_contract(ContractUpload {
                pdf: document.bytes.clone(),
                file_name: document.file_name.clone(),
                contract_type: model.descriptor().contract_type.clone(),
                lead_id: self.lead_id.clone(),
                contract_data: model.snapshot(),
            })
            .map_err(|error| ContextError::with_context(error.user_message()))?;
        log::info!(
            "Uploaded {:?} for the lead {} ({})",
            document.file_name,
            self.lead_id,
            receipt.view_url
        );

        Ok(Delivery::Uploaded(receipt))
    }
}

/// Turns a filled-in document into a paginated PDF: every section is rasterized in order,
/// then placed on its own A4 page.
pub struct Exporter {
    renderer: ResourceLoader<Box<dyn SectionRenderer>>,
    options: RasterOptions,
}

impl Exporter {
    pub fn new(renderer: ResourceLoader<Box<dyn SectionRenderer>>, options: RasterOptions) -> Self {
        Exporter { renderer, options }
    }

    /// An exporter painting with the typeface found at the given path, loaded on the first
    /// export.
    pub fn with_typeface_path(typeface_path: &Path) -> Self {
        let typeface_path = typeface_path.to_path_buf();
        let renderer = ResourceLoader::new("body typeface", move || {
            let typeface = FontFace::from_path(&typeface_path)?;
            Ok(Box::new(LayoutRenderer::new(Box::new(typeface))) as Box<dyn SectionRenderer>)
        });

        Exporter::new(renderer, RasterOptions::default())
    }

    /// Forgets the loaded resources, the next export loads them again.
    pub fn reset(&mut self) {
        self.renderer.reset();
    }

    pub fn is_loaded(&self) -> bool {
        self.renderer.is_loaded()
    }

    pub fn export(&self, model: &DocumentModel) -> Result<ExportedDocument, ExportError> {
        self.export_with_source(model, model)
    }

    /// Exports the document taking the section layouts from `source`, which may be missing
    /// some of them. Missing or unusable sections are skipped with a warning.
    pub fn export_with_source(
        &self,
        model: &DocumentModel,
        source: &dyn LayoutSource,
    ) -> Result<ExportedDocument, ExportError> {
        let descriptor = model.descriptor();
        log::info!("Exporting the document {:?}", descriptor.id);

        let renderer = self
            .renderer
            .load()
            .map_err(|error| fail(ExportStage::LoadingResources, error))?;
        let rasterizer = PageRasterizer::new(renderer.as_ref(), self.options.clone());

        let mut rendered_pages = Vec::new();
        let mut skipped_sections = Vec::new();
        for section in descriptor.sections.iter() {
            match rasterizer.rasterize(source, &section.id) {
                Ok(rendered_page) => rendered_pages.push(rendered_page),
                Err(failure) => {
                    log::warn!("Skipping the section {:?}: {}", section.id, failure);
                    skipped_sections.push(section.id.clone());
                }
            }
        }
        if rendered_pages.is_empty() {
            return Err(fail(
                ExportStage::Rasterization,
                ContextError::with_context(format!(
                    "None of the {} sections of the document could be rasterized",
                    descriptor.sections.len()
                )),
            ));
        }

        let paginator = Paginator::new(PageGeometry::A4, descriptor.margins);
        let mut pdf_document = paginator
            .assemble(&rendered_pages, random_token(32))
            .map_err(|error| fail(ExportStage::Pagination, error))?;
        pdf_document
            .write_all(random_token(32), &descriptor.title)
            .map_err(|error| fail(ExportStage::Pagination, error))?;
        pdf_document.optimize();
        let bytes = pdf_document
            .save_to_bytes()
            .map_err(|error| fail(ExportStage::Pagination, error))?;

        let exported_document = ExportedDocument {
            bytes,
            file_name: model.suggested_file_name(OffsetDateTime::now_utc().date()),
            geometry: paginator.geometry,
            margins: paginator.margins,
            page_count: pdf_document.page_count(),
            page_aspect_ratios: rendered_pages
                .iter()
                .map(|rendered_page| rendered_page.aspect_ratio())
                .collect(),
            skipped_sections,
        };
        log::info!(
            "Exported {:?} with {} pages",
            exported_document.file_name,
            exported_document.page_count
        );

        Ok(exported_document)
    }

    /// Exports the document and hands it to the sink.
    pub fn export_to(
        &self,
        model: &DocumentModel,
        sink: &mut dyn ExportSink,
    ) -> Result<Delivery, ExportError> {
        let exported_document = self.export(model)?;
        sink.deliver(&exported_document, model)
            .map_err(|error| fail(ExportStage::Delivery, error))
    }
}

fn fail(stage: ExportStage, error: ContextError) -> ExportError {
    let export_error = ExportError::new(stage, error);
    log::error!("{}", export_error);
    export_error
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use super::*;
    use crate::{
        bridge::InMemoryBridge, catalog::DocumentType, lead::Lead, typeface::BlockTypeface,
    };

    fn block_exporter(load_count: Rc<Cell<usize>>) -> Exporter {
        let renderer = ResourceLoader::new("block renderer", move || {
            load_count.set(load_count.get() + 1);
            Ok(Box::new(LayoutRenderer::new(Box::new(BlockTypeface::default())))
                as Box<dyn SectionRenderer>)
        });
        Exporter::new(renderer, RasterOptions::default())
    }

    #[test]
    fn renderer_is_loaded_once_until_reset() {
        let load_count = Rc::new(Cell::new(0));
        let mut exporter = block_exporter(load_count.clone());
        let model = DocumentModel::new(DocumentType::Warranty.descriptor()).unwrap();
        assert!(!exporter.is_loaded());

        exporter.export(&model).unwrap();
        exporter.export(&model).unwrap();
        assert_eq!(load_count.get(), 1);

        exporter.reset();
        exporter.export(&model).unwrap();
        assert_eq!(load_count.get(), 2);
    }

    #[test]
    fn missing_typeface_fails_while_loading_resources() {
        let exporter = Exporter::with_typeface_path(Path::new("/nonexistent/typeface.ttf"));
        let model = DocumentModel::new(DocumentType::Warranty.descriptor()).unwrap();

        let error = exporter.export(&model).unwrap_err();
        assert_eq!(error.stage, ExportStage::LoadingResources);
        assert_eq!(error.user_message(), "Failed to generate PDF. Please try again.");
    }

    #[test]
    fn file_name_follows_the_lead() {
        let exporter = block_exporter(Rc::new(Cell::new(0)));
        let mut model = DocumentModel::new(DocumentType::Warranty.descriptor()).unwrap();
        assert_eq!(exporter.export(&model).unwrap().file_name, "Warranty-Contract.pdf");

        model.prefill_from_lead(&Lead {
            id: "lead-1".into(),
            first_name: Some("Jane".into()),
            last_name: Some("Doe".into()),
            ..Lead::default()
        });
        let file_name = exporter.export(&model).unwrap().file_name;
        assert!(file_name.starts_with("Jane_Doe_Warranty-Contract_"));
        assert!(file_name.ends_with(".pdf"));
    }

    #[test]
    fn uploads_land_on_the_lead() {
        let exporter = block_exporter(Rc::new(Cell::new(0)));
        let model = DocumentModel::new(DocumentType::Warranty.descriptor()).unwrap();
        let bridge = InMemoryBridge::new("https://forms.example.com");
        bridge.sign_in("user-1");
        bridge.insert_lead(Lead {
            id: "lead-1".into(),
            ..Lead::default()
        });

        let delivery = exporter
            .export_to(&model, &mut BridgeUpload::new(&bridge, "lead-1"))
            .unwrap();
        let Delivery::Uploaded(receipt) = delivery else {
            panic!("The document was not uploaded");
        };
        let stored_pdf = bridge.stored_file(&receipt.storage_file_id).unwrap();
        assert!(stored_pdf.starts_with(b"%PDF"));
        assert_eq!(bridge.contracts_for_lead("lead-1").len(), 1);

        let error = exporter
            .export_to(&model, &mut BridgeUpload::new(&bridge, "lead-2"))
            .unwrap_err();
        assert_eq!(error.stage, ExportStage::Delivery);
    }

    #[test]
    fn documents_are_saved_under_their_suggested_name() {
        let exporter = block_exporter(Rc::new(Cell::new(0)));
        let model = DocumentModel::new(DocumentType::Warranty.descriptor()).unwrap();
        let directory = std::env::temp_dir().join(format!("contractr-{}", random_token(8)));

        let delivery = exporter
            .export_to(&model, &mut LocalDownload::new(&directory))
            .unwrap();
        assert_eq!(delivery, Delivery::Saved(directory.join("Warranty-Contract.pdf")));
        assert!(std::fs::read(directory.join("Warranty-Contract.pdf"))
            .unwrap()
            .starts_with(b"%PDF"));

        std::fs::remove_dir_all(directory).unwrap();
    }
}

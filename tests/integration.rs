//! Integration tests for the certificate generator

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use pdf_certificates::batch::{Batch, BatchReport};
use pdf_certificates::fonts::{FontCatalog, FontChoice, FontLibrary, FontRef, LoadedFont};
use pdf_certificates::layout::{FontSize, Placement, Rectangle};
use pdf_certificates::names::load_names;
use pdf_certificates::output::{CollisionPolicy, OutputManager};
use pdf_certificates::pdf::{render_certificate, CertificateTemplate};
use pdf_certificates::review::TerminalReviewer;
use pdf_certificates::Error;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Fonts commonly installed on Linux test machines
static SYSTEM_FONTS: [&str; 3] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSerif-Regular.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
];

/// Write an A4 landscape template with a border and a heading
fn create_template(dir: &Path) -> PathBuf {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });

    let content = Content {
        operations: vec![
            Operation::new("re", vec![20.into(), 20.into(), 802.into(), 555.into()]),
            Operation::new("S", vec![]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 36.into()]),
            Operation::new("Td", vec![250.into(), 480.into()]),
            Operation::new("Tj", vec![Object::string_literal("Certificate of Attendance")]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 842.into(), 595.into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let path = dir.join("template.pdf");
    doc.save(&path).unwrap();
    path
}

fn name_rect() -> Rectangle {
    Rectangle::new(171.0, 250.0, 671.0, 310.0)
}

fn run_batch(dir: &Path, names: &[String], font: FontRef) -> BatchReport {
    let template = CertificateTemplate::open(&create_template(dir)).unwrap();
    let catalog = FontCatalog::scan(&dir.join("fonts")).unwrap();
    let output = OutputManager::new(&dir.join("output"), CollisionPolicy::Suffix).unwrap();
    let choice = FontChoice {
        font,
        size: FontSize::default(),
    };

    let mut batch = Batch::new(
        &template,
        FontLibrary::new(catalog),
        choice,
        Placement::new(name_rect()),
        output,
    );
    batch.run(names, None).unwrap()
}

fn pdf_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
        .unwrap_or_default();
    files.retain(|p| p.extension().is_some_and(|ext| ext == "pdf"));
    files.sort();
    files
}

#[test]
fn test_hundred_names_produce_hundred_files() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let names: Vec<String> = (1..=100).map(|i| format!("Participant {}", i)).collect();

    let report = run_batch(temp_dir.path(), &names, FontRef::Builtin);

    assert_eq!(report.written.len(), 100);
    assert!(report.is_success());
    let files = pdf_files(&temp_dir.path().join("output"));
    assert_eq!(files.len(), 100);

    // Every certificate is a valid single-page PDF
    for file in files.iter().take(5) {
        let doc = Document::load(file).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }
}

#[test]
fn test_whitespace_name_becomes_clean_filename() {
    let temp_dir = TempDir::new().unwrap();
    let names_path = temp_dir.path().join("names.txt");
    fs::write(&names_path, "  John   Doe  \n").unwrap();

    let names = load_names(&names_path, true).unwrap();
    let report = run_batch(temp_dir.path(), &names, FontRef::Builtin);

    assert_eq!(report.written.len(), 1);
    assert_eq!(
        report.written[0].path,
        temp_dir.path().join("output").join("certificate_John_Doe.pdf")
    );
    assert_eq!(report.written[0].name, "John Doe");
}

#[test]
fn test_empty_names_file_creates_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let names_path = temp_dir.path().join("names.txt");
    fs::write(&names_path, "\n   \n\n").unwrap();

    let err = load_names(&names_path, false).unwrap_err();
    assert!(matches!(err, Error::NoNames(_)));
    assert!(err.to_string().contains("No names found"));
    assert!(pdf_files(&temp_dir.path().join("output")).is_empty());
}

#[test]
fn test_duplicate_names_are_suffixed() {
    let temp_dir = TempDir::new().unwrap();
    let names = vec!["Ada Lovelace".to_string(), "Ada Lovelace".to_string(), "Ada  Lovelace".to_string()];

    let report = run_batch(temp_dir.path(), &names, FontRef::Builtin);

    let file_names: Vec<String> = report
        .written
        .iter()
        .map(|r| r.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        file_names,
        vec![
            "certificate_Ada_Lovelace.pdf",
            "certificate_Ada_Lovelace_2.pdf",
            "certificate_Ada_Lovelace_3.pdf",
        ]
    );
}

#[test]
fn test_second_run_never_overwrites() {
    let temp_dir = TempDir::new().unwrap();
    let names = vec!["Grace Hopper".to_string()];

    run_batch(temp_dir.path(), &names, FontRef::Builtin);
    let first = temp_dir.path().join("output/certificate_Grace_Hopper.pdf");
    let original = fs::read(&first).unwrap();

    let report = run_batch(temp_dir.path(), &names, FontRef::Builtin);

    assert!(report.written[0].path.ends_with("certificate_Grace_Hopper_2.pdf"));
    assert_eq!(fs::read(&first).unwrap(), original);
}

#[test]
fn test_manual_cancel_keeps_first_certificate() {
    let temp_dir = TempDir::new().unwrap();
    let template = CertificateTemplate::open(&create_template(temp_dir.path())).unwrap();
    let catalog = FontCatalog::scan(&temp_dir.path().join("fonts")).unwrap();
    let output = OutputManager::new(&temp_dir.path().join("output"), CollisionPolicy::Suffix).unwrap();
    let choice = FontChoice {
        font: FontRef::Builtin,
        size: FontSize::default(),
    };
    let mut batch = Batch::new(
        &template,
        FontLibrary::new(catalog),
        choice,
        Placement::new(name_rect()),
        output,
    );

    let names = vec!["Ada".to_string(), "Grace".to_string(), "Alan".to_string()];
    let mut reviewer = TerminalReviewer::new(Cursor::new("size 40\n\nq\n"), Vec::new());
    let report = batch.run(&names, Some(&mut reviewer)).unwrap();

    assert!(report.cancelled);
    assert_eq!(report.written.len(), 1);
    let files = pdf_files(&temp_dir.path().join("output"));
    assert_eq!(files, vec![temp_dir.path().join("output/certificate_Ada.pdf")]);

    // The confirmed size was proposed for the next name
    let printed = String::from_utf8(reviewer.into_output()).unwrap();
    assert!(printed.contains("[2/3] Grace\n  font Times-Roman, 40pt,"));
}

#[test]
fn test_text_stays_inside_rectangle() {
    let temp_dir = TempDir::new().unwrap();
    let template = CertificateTemplate::open(&create_template(temp_dir.path())).unwrap();
    let font = LoadedFont::builtin();
    let placement = Placement::new(name_rect());

    for name in ["Al", "Maximilian Alexander von Habsburg-Lothringen", "Zoë Ñúñez"] {
        let rendered = render_certificate(&template, name, &font, FontSize::default(), &placement).unwrap();
        assert!(rendered.layout.fits, "{} should fit", name);
        assert!(
            placement.rect.contains(&rendered.layout.bounds),
            "{} drawn at {} outside {}",
            name,
            rendered.layout.bounds,
            placement.rect
        );

        // The text position written to the file matches the layout
        let doc = Document::load_mem(&rendered.bytes).unwrap();
        let page_id = *doc.get_pages().values().next().unwrap();
        let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
        let last = |operator: &str| {
            content
                .operations
                .iter()
                .rev()
                .find(|op| op.operator == operator)
                .map(|op| op.operands.iter().filter_map(|o| o.as_float().ok()).collect::<Vec<f32>>())
                .unwrap()
        };
        let size = last("Tf")[0];
        let tm = last("Tm");
        let (x, baseline) = (tm[4], tm[5]);

        assert_eq!(size, rendered.layout.font_size, "{}", name);
        assert!(x >= placement.rect.x0 - 0.01, "{} starts at {}", name, x);
        assert!(x + rendered.layout.width <= placement.rect.x1 + 0.01, "{} ends past the rectangle", name);
        assert!(baseline > placement.rect.y0 && baseline < placement.rect.y1, "{} baseline {}", name, baseline);
    }
}

#[test]
fn test_embedded_system_font() {
    let Some(system_font) = SYSTEM_FONTS.iter().map(Path::new).find(|p| p.exists()) else {
        eprintln!("Skipping embedded font test: no system TrueType font found");
        return;
    };

    let temp_dir = TempDir::new().unwrap();
    let family_dir = temp_dir.path().join("fonts").join("System");
    fs::create_dir_all(&family_dir).unwrap();
    let file_name = system_font.file_name().unwrap();
    fs::copy(system_font, family_dir.join(file_name)).unwrap();

    let catalog = FontCatalog::scan(&temp_dir.path().join("fonts")).unwrap();
    let font = catalog.choose(None).unwrap();
    assert!(font.label().starts_with("System/"));

    let report = run_batch(temp_dir.path(), &["Zoë Łukasiewicz".to_string()], font);
    assert_eq!(report.written.len(), 1);

    let doc = Document::load(&report.written[0].path).unwrap();
    let page_id = *doc.get_pages().values().next().unwrap();
    let content = String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned();
    assert!(content.contains("TJ"));

    let page = doc.get_dictionary(page_id).unwrap();
    let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
    let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
    let font_id = fonts.get(b"CertName").unwrap().as_reference().unwrap();
    let name_font = doc.get_dictionary(font_id).unwrap();
    assert_eq!(name_font.get(b"Subtype").unwrap().as_name().unwrap(), b"Type0");
    assert!(name_font.has(b"ToUnicode"));
}

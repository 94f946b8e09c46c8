//! Office Open XML (.pptx) package writer.
//!
//! Produces a minimal but complete PresentationML package: one slide master,
//! a "Title Slide" layout, a "Title and Content" layout, a theme, and one part
//! per slide. Every text run carries an explicit size so the typography does
//! not depend on master defaults.

use crate::presentation::{Paragraph, Placeholder, Presentation, SlideLayout, TextShape};
use anyhow::{Context, Result};
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
const NS_ATTRS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;
const REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_TYPE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const CT_PML: &str = "application/vnd.openxmlformats-officedocument.presentationml";

// 10in x 7.5in, the 4:3 default
const SLIDE_WIDTH: u64 = 9_144_000;
const SLIDE_HEIGHT: u64 = 6_858_000;

/// Serialize a presentation into .pptx bytes
pub fn write_presentation(presentation: &Presentation) -> Result<Vec<u8>> {
    let slide_count = presentation.slides.len();
    let mut parts: Vec<(String, String)> = vec![
        ("[Content_Types].xml".into(), content_types(slide_count)),
        ("_rels/.rels".into(), package_rels()),
        ("docProps/core.xml".into(), core_props(&presentation.topic)),
        ("docProps/app.xml".into(), app_props(slide_count)),
        ("ppt/presentation.xml".into(), presentation_part(slide_count)),
        (
            "ppt/_rels/presentation.xml.rels".into(),
            presentation_rels(slide_count),
        ),
        ("ppt/slideMasters/slideMaster1.xml".into(), slide_master()),
        (
            "ppt/slideMasters/_rels/slideMaster1.xml.rels".into(),
            slide_master_rels(),
        ),
        ("ppt/slideLayouts/slideLayout1.xml".into(), title_layout()),
        ("ppt/slideLayouts/slideLayout2.xml".into(), content_layout()),
        (
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels".into(),
            layout_rels(),
        ),
        (
            "ppt/slideLayouts/_rels/slideLayout2.xml.rels".into(),
            layout_rels(),
        ),
        ("ppt/theme/theme1.xml".into(), theme()),
    ];

    for (i, slide) in presentation.slides.iter().enumerate() {
        let number = i + 1;
        let shapes: String = slide
            .shapes
            .iter()
            .enumerate()
            .map(|(j, shape)| shape_xml(j as u32 + 2, shape))
            .collect();
        parts.push((
            format!("ppt/slides/slide{}.xml", number),
            slide_part(&shapes),
        ));
        parts.push((
            format!("ppt/slides/_rels/slide{}.xml.rels", number),
            slide_rels(slide.layout),
        ));
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in parts {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file(name.as_str(), options)
            .with_context(|| format!("Failed to start package part {}", name))?;
        zip.write_all(body.as_bytes())
            .with_context(|| format!("Failed to write package part {}", name))?;
    }
    let cursor = zip.finish().context("Failed to finish presentation package")?;
    Ok(cursor.into_inner())
}

/// Escape text for XML content and attributes, dropping characters XML 1.0 forbids
pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\t' | '\n' | '\r' => escaped.push(c),
            c if c.is_control() => {}
            c => escaped.push(c),
        }
    }
    escaped
}

fn content_types(slide_count: usize) -> String {
    let mut xml = format!(
        r#"{XML_DECL}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/ppt/presentation.xml" ContentType="{CT_PML}.presentation.main+xml"/><Override PartName="/ppt/slideMasters/slideMaster1.xml" ContentType="{CT_PML}.slideMaster+xml"/><Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="{CT_PML}.slideLayout+xml"/><Override PartName="/ppt/slideLayouts/slideLayout2.xml" ContentType="{CT_PML}.slideLayout+xml"/><Override PartName="/ppt/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/><Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/><Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/>"#
    );
    for number in 1..=slide_count {
        xml.push_str(&format!(
            r#"<Override PartName="/ppt/slides/slide{number}.xml" ContentType="{CT_PML}.slide+xml"/>"#
        ));
    }
    xml.push_str("</Types>");
    xml
}

fn package_rels() -> String {
    format!(
        r#"{XML_DECL}<Relationships xmlns="{REL_NS}"><Relationship Id="rId1" Type="{REL_TYPE}/officeDocument" Target="ppt/presentation.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/><Relationship Id="rId3" Type="{REL_TYPE}/extended-properties" Target="docProps/app.xml"/></Relationships>"#
    )
}

fn core_props(topic: &str) -> String {
    format!(
        r#"{XML_DECL}<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><dc:title>{}</dc:title></cp:coreProperties>"#,
        escape_xml(topic)
    )
}

fn app_props(slide_count: usize) -> String {
    format!(
        r#"{XML_DECL}<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties"><Application>{}</Application><Slides>{slide_count}</Slides></Properties>"#,
        env!("CARGO_PKG_NAME")
    )
}

fn presentation_part(slide_count: usize) -> String {
    let slide_ids: String = (0..slide_count)
        .map(|i| format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + i, i + 3))
        .collect();
    format!(
        r#"{XML_DECL}<p:presentation {NS_ATTRS} saveSubsetFonts="1"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst>{slide_ids}</p:sldIdLst><p:sldSz cx="{SLIDE_WIDTH}" cy="{SLIDE_HEIGHT}" type="screen4x3"/><p:notesSz cx="{SLIDE_HEIGHT}" cy="{SLIDE_WIDTH}"/></p:presentation>"#
    )
}

fn presentation_rels(slide_count: usize) -> String {
    let mut xml = format!(
        r#"{XML_DECL}<Relationships xmlns="{REL_NS}"><Relationship Id="rId1" Type="{REL_TYPE}/slideMaster" Target="slideMasters/slideMaster1.xml"/><Relationship Id="rId2" Type="{REL_TYPE}/theme" Target="theme/theme1.xml"/>"#
    );
    for i in 0..slide_count {
        xml.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="{REL_TYPE}/slide" Target="slides/slide{}.xml"/>"#,
            i + 3,
            i + 1
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

fn group_header() -> &'static str {
    r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#
}

/// Placeholder declaration with geometry, used by the master and layouts
fn placeholder_sp(id: u32, name: &str, ph: &str, (x, y, cx, cy): (u64, u64, u64, u64)) -> String {
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{name}"/><p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr><p:nvPr>{ph}</p:nvPr></p:nvSpPr><p:spPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm></p:spPr><p:txBody><a:bodyPr/><a:lstStyle/><a:p><a:endParaRPr lang="en-US"/></a:p></p:txBody></p:sp>"#
    )
}

const TITLE_FRAME: (u64, u64, u64, u64) = (457_200, 274_638, 8_229_600, 1_143_000);
const BODY_FRAME: (u64, u64, u64, u64) = (457_200, 1_600_200, 8_229_600, 4_525_963);
const CENTER_TITLE_FRAME: (u64, u64, u64, u64) = (685_800, 2_130_425, 7_772_400, 1_470_025);
const SUBTITLE_FRAME: (u64, u64, u64, u64) = (1_371_600, 3_886_200, 6_400_800, 1_752_600);

fn slide_master() -> String {
    let title = placeholder_sp(2, "Title Placeholder 1", r#"<p:ph type="title"/>"#, TITLE_FRAME);
    let body = placeholder_sp(
        3,
        "Text Placeholder 2",
        r#"<p:ph type="body" idx="1"/>"#,
        BODY_FRAME,
    );
    format!(
        r#"{XML_DECL}<p:sldMaster {NS_ATTRS}><p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg><p:spTree>{}{title}{body}</p:spTree></p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/><p:sldLayoutId id="2147483650" r:id="rId2"/></p:sldLayoutIdLst><p:txStyles><p:titleStyle><a:lvl1pPr algn="ctr"><a:defRPr sz="4400"><a:solidFill><a:schemeClr val="tx1"/></a:solidFill><a:latin typeface="+mj-lt"/></a:defRPr></a:lvl1pPr></p:titleStyle><p:bodyStyle><a:lvl1pPr marL="342900" indent="-342900"><a:buChar char="&#8226;"/><a:defRPr sz="3200"><a:solidFill><a:schemeClr val="tx1"/></a:solidFill><a:latin typeface="+mn-lt"/></a:defRPr></a:lvl1pPr></p:bodyStyle><p:otherStyle><a:lvl1pPr><a:defRPr sz="1800"><a:solidFill><a:schemeClr val="tx1"/></a:solidFill></a:defRPr></a:lvl1pPr></p:otherStyle></p:txStyles></p:sldMaster>"#,
        group_header()
    )
}

fn slide_master_rels() -> String {
    format!(
        r#"{XML_DECL}<Relationships xmlns="{REL_NS}"><Relationship Id="rId1" Type="{REL_TYPE}/slideLayout" Target="../slideLayouts/slideLayout1.xml"/><Relationship Id="rId2" Type="{REL_TYPE}/slideLayout" Target="../slideLayouts/slideLayout2.xml"/><Relationship Id="rId3" Type="{REL_TYPE}/theme" Target="../theme/theme1.xml"/></Relationships>"#
    )
}

fn title_layout() -> String {
    let title = placeholder_sp(2, "Title 1", r#"<p:ph type="ctrTitle"/>"#, CENTER_TITLE_FRAME);
    let subtitle = placeholder_sp(
        3,
        "Subtitle 2",
        r#"<p:ph type="subTitle" idx="1"/>"#,
        SUBTITLE_FRAME,
    );
    layout("title", "Title Slide", &format!("{title}{subtitle}"))
}

fn content_layout() -> String {
    let title = placeholder_sp(2, "Title 1", r#"<p:ph type="title"/>"#, TITLE_FRAME);
    let body = placeholder_sp(3, "Content Placeholder 2", r#"<p:ph idx="1"/>"#, BODY_FRAME);
    layout("obj", "Title and Content", &format!("{title}{body}"))
}

fn layout(kind: &str, name: &str, shapes: &str) -> String {
    format!(
        r#"{XML_DECL}<p:sldLayout {NS_ATTRS} type="{kind}" preserve="1"><p:cSld name="{name}"><p:spTree>{}{shapes}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#,
        group_header()
    )
}

fn layout_rels() -> String {
    format!(
        r#"{XML_DECL}<Relationships xmlns="{REL_NS}"><Relationship Id="rId1" Type="{REL_TYPE}/slideMaster" Target="../slideMasters/slideMaster1.xml"/></Relationships>"#
    )
}

fn slide_part(shapes: &str) -> String {
    format!(
        r#"{XML_DECL}<p:sld {NS_ATTRS}><p:cSld><p:spTree>{}{shapes}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#,
        group_header()
    )
}

fn slide_rels(layout: SlideLayout) -> String {
    let target = match layout {
        SlideLayout::Title => "slideLayout1.xml",
        SlideLayout::TitleAndContent => "slideLayout2.xml",
    };
    format!(
        r#"{XML_DECL}<Relationships xmlns="{REL_NS}"><Relationship Id="rId1" Type="{REL_TYPE}/slideLayout" Target="../slideLayouts/{target}"/></Relationships>"#
    )
}

/// Slide shapes inherit geometry from the layout, so only text is written
fn shape_xml(id: u32, shape: &TextShape) -> String {
    let (name, ph) = match shape.placeholder {
        Placeholder::CenteredTitle => ("Title", r#"<p:ph type="ctrTitle"/>"#),
        Placeholder::Title => ("Title", r#"<p:ph type="title"/>"#),
        Placeholder::Body => ("Content Placeholder", r#"<p:ph idx="1"/>"#),
    };
    let paragraphs: String = shape.paragraphs.iter().map(paragraph_xml).collect();
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{name} {}"/><p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr><p:nvPr>{ph}</p:nvPr></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:lstStyle/>{paragraphs}</p:txBody></p:sp>"#,
        id - 1
    )
}

fn paragraph_xml(paragraph: &Paragraph) -> String {
    let sz = paragraph.font_size.hundredths();
    if paragraph.text.is_empty() {
        return format!(
            r#"<a:p><a:pPr><a:defRPr sz="{sz}"/></a:pPr><a:endParaRPr lang="en-US" sz="{sz}" dirty="0"/></a:p>"#
        );
    }
    format!(
        r#"<a:p><a:pPr><a:defRPr sz="{sz}"/></a:pPr><a:r><a:rPr lang="en-US" sz="{sz}" dirty="0"/><a:t>{}</a:t></a:r></a:p>"#,
        escape_xml(&paragraph.text)
    )
}

fn theme() -> String {
    let color = |name: &str, hex: &str| format!(r#"<a:{name}><a:srgbClr val="{hex}"/></a:{name}>"#);
    let colors = [
        color("dk1", "000000"),
        color("lt1", "FFFFFF"),
        color("dk2", "1F497D"),
        color("lt2", "EEECE1"),
        color("accent1", "4F81BD"),
        color("accent2", "C0504D"),
        color("accent3", "9BBB59"),
        color("accent4", "8064A2"),
        color("accent5", "4BACC6"),
        color("accent6", "F79646"),
        color("hlink", "0000FF"),
        color("folHlink", "800080"),
    ]
    .concat();
    let font = |tag: &str, face: &str| {
        format!(r#"<a:{tag}><a:latin typeface="{face}"/><a:ea typeface=""/><a:cs typeface=""/></a:{tag}>"#)
    };
    let fill = r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#;
    let line = |w: u32| {
        format!(r#"<a:ln w="{w}"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:prstDash val="solid"/></a:ln>"#)
    };
    let effect = r#"<a:effectStyle><a:effectLst/></a:effectStyle>"#;

    format!(
        r#"{XML_DECL}<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Office Theme"><a:themeElements><a:clrScheme name="Office">{colors}</a:clrScheme><a:fontScheme name="Office">{}{}</a:fontScheme><a:fmtScheme name="Office"><a:fillStyleLst>{fill}{fill}{fill}</a:fillStyleLst><a:lnStyleLst>{}{}{}</a:lnStyleLst><a:effectStyleLst>{effect}{effect}{effect}</a:effectStyleLst><a:bgFillStyleLst>{fill}{fill}{fill}</a:bgFillStyleLst></a:fmtScheme></a:themeElements><a:objectDefaults/><a:extraClrSchemeLst/></a:theme>"#,
        font("majorFont", "Calibri"),
        font("minorFont", "Calibri"),
        line(9525),
        line(25400),
        line(38100),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::SlideSpec;
    use std::io::Read;

    fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut part = archive.by_name(name).unwrap();
        let mut xml = String::new();
        part.read_to_string(&mut xml).unwrap();
        xml
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(
            escape_xml("R&D <fast> \"quoted\" it's\u{7}"),
            "R&amp;D &lt;fast&gt; &quot;quoted&quot; it&apos;s"
        );
    }

    #[test]
    fn test_package_contains_one_part_per_slide() {
        let presentation = Presentation::new(
            "Rust & Safety",
            &[SlideSpec {
                title: "Ownership".to_string(),
                body: "Moves\n\nBorrows".to_string(),
            }],
        );
        let bytes = write_presentation(&presentation).unwrap();

        let archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert!(names.contains(&"[Content_Types].xml"));
        assert!(names.contains(&"ppt/slides/slide1.xml"));
        assert!(names.contains(&"ppt/slides/slide2.xml"));
        assert!(!names.contains(&"ppt/slides/slide3.xml"));

        let content_types = read_part(&bytes, "[Content_Types].xml");
        assert!(content_types.contains("/ppt/slides/slide2.xml"));

        let title = read_part(&bytes, "ppt/slides/slide1.xml");
        assert!(title.contains(r#"<p:ph type="ctrTitle"/>"#));
        assert!(title.contains("<a:t>Rust &amp; Safety</a:t>"));
        assert!(title.contains(r#"sz="3000""#));
        assert!(!title.contains(r#"sz="1600""#));

        let content = read_part(&bytes, "ppt/slides/slide2.xml");
        assert!(content.contains("<a:t>Ownership</a:t>"));
        assert!(content.contains("<a:t>Borrows</a:t>"));
        assert_eq!(content.matches("<a:p>").count(), 4);

        let rels = read_part(&bytes, "ppt/slides/_rels/slide2.xml.rels");
        assert!(rels.contains("slideLayout2.xml"));
        let presentation_rels = read_part(&bytes, "ppt/_rels/presentation.xml.rels");
        assert!(presentation_rels.contains(r#"Id="rId4""#));
    }
}

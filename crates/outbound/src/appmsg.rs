//! App-message XML bodies for files, music cards and rich links.

use std::{borrow::Cow, path::Path};

use crate::payload::UploadedFile;

/// App id the gateway associates with music shares.
const MUSIC_APP_ID: &str = "wx79f2c4418704b4f8";

/// A playable song card.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MusicCard {
    pub title: String,
    pub singer: String,
    /// Page opened when the card is tapped.
    pub url: String,
    /// Direct audio stream.
    pub music_url: String,
    pub cover_url: String,
    pub lyric: String,
}

/// A link preview card.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RichLink {
    pub title: String,
    pub description: String,
    pub url: String,
    pub thumb_url: String,
}

/// Escape text for use in XML element content or attribute values.
#[must_use]
pub fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// File name and extension (without the dot) of `path`.
#[must_use]
pub fn file_name_parts(path: &Path) -> (String, String) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    (name, ext)
}

/// Type-6 attachment message referencing an uploaded file.
#[must_use]
pub fn file_xml(file_name: &str, file_ext: &str, upload: &UploadedFile) -> String {
    format!(
        "<appmsg appid=\"\" sdkver=\"0\"><title>{}</title><des></des><action></action>\
         <type>6</type><showtype>0</showtype><content></content><url></url><appattach><totallen>{}</totallen>\
         <attachid>{}</attachid><fileext>{}</fileext></appattach><md5></md5></appmsg>",
        escape(file_name),
        upload.total_len,
        escape(&upload.media_id),
        escape(file_ext),
    )
}

/// Type-3 music message. `from` is the sending account.
#[must_use]
pub fn music_xml(card: &MusicCard, from: &str) -> String {
    let title = escape(&card.title);
    let singer = escape(&card.singer);
    let url = escape(&card.url);
    let music_url = escape(&card.music_url);
    let cover = escape(&card.cover_url);
    let lyric = escape(&card.lyric);
    let from = escape(from);

    format!(
        "<appmsg appid=\"{MUSIC_APP_ID}\" sdkver=\"0\"><title>{title}</title>\
         <des>{singer}</des><action>view</action><type>3</type><showtype>0</showtype><content/><url>{url}</url><dataurl>{music_url}</dataurl>\
         <lowurl>{url}</lowurl><lowdataurl>{music_url}</lowdataurl><recorditem/>\
         <thumburl>{cover}</thumburl><messageaction/><laninfo/><extinfo/><sourceusername/>\
         <sourcedisplayname/><songlyric>{lyric}</songlyric><commenturl/><appattach>\
         <totallen>0</totallen><attachid/><emoticonmd5/><fileext/><aeskey/></appattach>\
         <webviewshared><publisherId/><publisherReqId>0</publisherReqId></webviewshared>\
         <weappinfo><pagepath/><username/><appid/><appservicetype>0</appservicetype></weappinfo>\
         <websearch/><songalbumurl>{cover}</songalbumurl></appmsg>\
         <fromusername>{from}</fromusername><scene>0</scene><appinfo><version>1</version><appname/></appinfo><commenturl/>"
    )
}

/// Type-5 link message.
#[must_use]
pub fn rich_xml(link: &RichLink) -> String {
    format!(
        "<appmsg><title>{}</title><des>{}</des><type>5</type><url>{}</url>\
         <thumburl>{}</thumburl></appmsg>",
        escape(&link.title),
        escape(&link.description),
        escape(&link.url),
        escape(&link.thumb_url),
    )
}

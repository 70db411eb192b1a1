use anyhow::Result;

use crate::scanner::Preview;
use crate::store::{Credentials, EditVersion, StoreClient, TrailerUpload};

/// Mutable upload state threaded through the streaming loop.
struct UploadSession {
    version: EditVersion,
    previous_locale: Option<String>,
    uploaded: usize,
}

/// Stream the records to the store in scan order. Each locale's batch is
/// committed as its own save; a new edit version is opened at every locale
/// boundary and the last open version is always saved, even for an empty
/// stream. Upload and save errors are not caught here: the first failure
/// aborts the rest of the stream.
pub fn upload_previews<C: StoreClient>(
    client: &mut C,
    previews: &[Preview],
    credentials: &Credentials,
) -> Result<usize> {
    println!("Logging in to the store ({})", credentials.username);
    client.login(&credentials.username)?;
    println!("Login successful");

    let app = client.find_app(&credentials.app_identifier)?;

    let mut session = UploadSession {
        version: client.create_edit_version(&app, &credentials.platform)?,
        previous_locale: None,
        uploaded: 0,
    };

    println!("Uploading videos");
    for preview in previews {
        if let Some(previous) = &session.previous_locale {
            if previous != &preview.locale {
                println!("✓ Completed locale {}", previous);
                client.save_version(&session.version)?;
                session.version = client.create_edit_version(&app, &credentials.platform)?;
            }
        }

        println!(
            "Uploading app preview {} for locale {}...",
            preview.video_path.display(),
            preview.locale
        );
        client.upload_trailer(&session.version, &TrailerUpload::from_preview(preview))?;
        println!("✓ Done uploading app preview");
        session.uploaded += 1;
        session.previous_locale = Some(preview.locale.clone());
    }

    println!("Final save");
    client.save_version(&session.version)?;
    println!("Uploaded {} videos", session.uploaded);

    Ok(session.uploaded)
}

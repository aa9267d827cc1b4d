//! Configuration loading through files and environment

use enrol_backend_lib::config::{MailTransport, Settings, SmtpTls};
use figment::Jail;

#[test]
fn test_load_from_file_and_env() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
                secret_key = "file-secret-0123456789"
                public_base_url = "https://enrol.example.com/"

                [confirmation]
                max_age_secs = 600

                [mail]
                transport = "smtp"
                smtp_host = "smtp.example.com"
                smtp_tls = "tls"
            "#,
        )?;
        jail.set_env("ENROL_MAIL__SMTP_PORT", "465");
        jail.set_env("ENROL_SITE__APP_NAME", "Acme");

        let settings = Settings::load().map_err(|e| e.to_string())?;
        assert_eq!(settings.confirmation.max_age_secs, 600);
        assert_eq!(settings.confirmation.salt, "email-confirmation-salt");
        assert_eq!(settings.mail.transport, MailTransport::Smtp);
        assert_eq!(settings.mail.smtp_tls, SmtpTls::Tls);
        assert_eq!(settings.mail.smtp_port, 465);
        assert_eq!(settings.site.app_name, "Acme");
        assert_eq!(
            settings.confirmation_link("abc.def.ghi"),
            "https://enrol.example.com/confirm/abc.def.ghi"
        );
        Ok(())
    });
}

#[test]
fn test_missing_secret_is_rejected() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", "log_level = \"debug\"")?;
        assert!(Settings::load().is_err());

        jail.set_env("ENROL_SECRET_KEY", "env-secret-0123456789");
        let settings = Settings::load().map_err(|e| e.to_string())?;
        assert_eq!(settings.log_level, "debug");
        Ok(())
    });
}

#[test]
fn test_smtp_without_host_is_rejected() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
                secret_key = "file-secret-0123456789"
                [mail]
                transport = "smtp"
            "#,
        )?;
        assert!(Settings::load().is_err());
        Ok(())
    });
}

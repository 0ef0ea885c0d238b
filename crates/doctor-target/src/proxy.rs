//! Reverse-proxy (nginx) configuration template.

use crate::ops::ProxyParams;

/// Render the nginx site configuration for `params`.
///
/// The template is fixed: HTTP on port 80 redirects to TLS, and the TLS
/// server forwards everything to the upstream application.
pub fn render_proxy_config(params: &ProxyParams) -> String {
    format!(
        r#"upstream app_upstream {{
    server {upstream_host}:{upstream_port};
}}

server {{
    listen 80;
    server_name {server_name};
    return 301 https://$host:{listen_port}$request_uri;
}}

server {{
    listen {listen_port} ssl;
    server_name {server_name};

    ssl_certificate {certificate};
    ssl_certificate_key {certificate_key};
    ssl_protocols TLSv1.2 TLSv1.3;

    client_max_body_size 16M;

    location / {{
        proxy_pass http://app_upstream;
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto $scheme;
        proxy_connect_timeout 10s;
        proxy_read_timeout 60s;
    }}

    location /health {{
        proxy_pass http://app_upstream/health;
        access_log off;
    }}
}}
"#,
        upstream_host = params.upstream_host,
        upstream_port = params.upstream_port,
        server_name = params.server_name,
        listen_port = params.listen_port,
        certificate = params.certificate,
        certificate_key = params.certificate_key,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn params() -> ProxyParams {
        ProxyParams {
            server_name: "maint.example.org".to_string(),
            listen_port: 8443,
            upstream_host: "app".to_string(),
            upstream_port: 5000,
            certificate: "/etc/nginx/ssl/cert.pem".to_string(),
            certificate_key: "/etc/nginx/ssl/key.pem".to_string(),
            output_path: PathBuf::from("/tmp/default.conf"),
        }
    }

    #[test]
    fn test_render_contains_upstream_and_tls() {
        let conf = render_proxy_config(&params());
        assert!(conf.contains("server app:5000;"));
        assert!(conf.contains("listen 8443 ssl;"));
        assert!(conf.contains("server_name maint.example.org;"));
        assert!(conf.contains("ssl_certificate /etc/nginx/ssl/cert.pem;"));
        assert!(conf.contains("ssl_certificate_key /etc/nginx/ssl/key.pem;"));
    }

    #[test]
    fn test_render_keeps_nginx_variables() {
        let conf = render_proxy_config(&params());
        assert!(conf.contains("$request_uri"));
        assert!(conf.contains("proxy_set_header Host $host;"));
    }

    #[test]
    fn test_render_is_deterministic() {
        assert_eq!(render_proxy_config(&params()), render_proxy_config(&params()));
    }
}
